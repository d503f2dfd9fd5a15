//! Fires due resurface tasks.
//!
//! The worker is built from a database path and a notifier only, so it can
//! run in a different process than the one that scheduled the task, or
//! after that process has exited.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time;

use super::payload::ResurfacePayload;
use super::queue::{ResurfaceQueue, ResurfaceTask, TaskState};
use super::{RearmReport, ResurfaceScheduler};
use crate::error::{CoreError, NotifyError, PersistenceError};
use crate::item::SnoozedItem;
use crate::quiet_hours::Zone;
use crate::storage::{Database, SettingsStore, SnoozeItemStore, SqliteItemStore, WorkerConfig};

/// Durations offered as "snooze again" actions on a resurfaced notification.
pub const RESNOOZE_MINUTES: [i64; 2] = [15, 60];

/// [`ResurfaceWorker::run`] re-arms pending items on every Nth poll.
pub const REARM_EVERY_POLLS: u64 = 4;

/// A "snooze again" action attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeAction {
    pub label: String,
    pub minutes: i64,
}

/// What gets posted when an item resurfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resurfaced {
    pub item_id: String,
    pub title: String,
    pub summary: String,
    pub snooze_until: DateTime<Utc>,
    pub actions: Vec<SnoozeAction>,
}

impl Resurfaced {
    /// Built from the stored row, so text edits made after scheduling show up.
    fn from_item(item: &SnoozedItem) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            summary: item.summary.clone(),
            snooze_until: item.snooze_until,
            actions: RESNOOZE_MINUTES
                .iter()
                .map(|&minutes| SnoozeAction {
                    label: format!("Snooze {minutes}m"),
                    minutes,
                })
                .collect(),
        }
    }
}

/// Platform capability that posts a local notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Resurfaced) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, notification: &Resurfaced) -> Result<(), NotifyError> {
        (**self).notify(notification).await
    }
}

/// Worker limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    pub poll_interval: Duration,
    /// Maximum tasks fired per pass.
    pub batch_size: u32,
    /// Wall-clock budget for one pass.
    pub budget: Duration,
    /// Delivery attempts before a task is marked failed.
    pub max_fire_attempts: u32,
    /// A task in `firing` for longer than this is assumed abandoned.
    pub lease: chrono::Duration,
    /// Finished tasks older than this are deleted.
    pub retention: chrono::Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerOptions {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size,
            budget: config.budget(),
            max_fire_attempts: config.max_fire_attempts,
            lease: config.lease(),
            retention: config.retention(),
        }
    }
}

/// Outcome of one [`ResurfaceWorker::run_due`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub recovered: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub superseded: usize,
    /// Returned to the queue after a delivery failure.
    pub retried: usize,
    pub failed: usize,
    /// Finished tasks deleted after their retention ran out.
    pub purged: usize,
    /// The pass stopped because its budget ran out.
    pub timed_out: bool,
}

impl PassReport {
    /// Tasks that left the `scheduled` state during this pass.
    pub fn fired(&self) -> usize {
        self.delivered + self.cancelled + self.superseded + self.retried + self.failed
    }
}

enum FireOutcome {
    Delivered,
    Cancelled,
    Superseded,
    Retried,
    Failed,
    /// The task changed underneath the worker; nothing was recorded.
    Stale,
}

/// Fires due tasks.
pub struct ResurfaceWorker<N> {
    db: Arc<Database>,
    scheduler: ResurfaceScheduler,
    store: SqliteItemStore,
    notifier: N,
    options: WorkerOptions,
}

impl<N: Notifier> ResurfaceWorker<N> {
    /// Open the database at `path` and build a worker over it.
    pub fn open(path: impl AsRef<Path>, notifier: N, options: WorkerOptions) -> Result<Self, PersistenceError> {
        let db = Arc::new(Database::open(path)?);
        Ok(Self::new(db, notifier, options))
    }

    pub fn new(db: Arc<Database>, notifier: N, options: WorkerOptions) -> Self {
        Self {
            scheduler: ResurfaceScheduler::new(db.clone()),
            store: SqliteItemStore::new(db.clone()),
            db,
            notifier,
            options,
        }
    }

    /// Read quiet hours in `zone` when re-arming.
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.scheduler = self.scheduler.with_zone(zone);
        self
    }

    pub fn queue(&self) -> &ResurfaceQueue {
        self.scheduler.queue()
    }

    /// Re-register pending items whose task is missing or out of date,
    /// using the quiet hours currently stored in settings.
    pub fn rearm(&self, now: DateTime<Utc>) -> Result<RearmReport, CoreError> {
        let settings = SettingsStore::load(self.db.clone())?.snapshot();
        Ok(self.scheduler.rearm(&self.store, Some(&settings.quiet_hours), now)?)
    }

    /// Fire every task due at `now`, within the batch size and time budget.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<PassReport, PersistenceError> {
        let mut report = PassReport {
            recovered: self.scheduler.recover(self.options.lease, now)?,
            ..PassReport::default()
        };

        let budget = self.options.budget;
        match time::timeout(budget, self.fire_batch(now, &mut report)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    budget_ms = budget.as_millis() as u64,
                    fired = report.fired(),
                    "resurface pass ran out of budget"
                );
                report.timed_out = true;
            }
        }

        let finished_before = now
            .checked_sub_signed(self.options.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        report.purged = self.queue().purge_terminal(finished_before)?;
        if report.purged > 0 {
            tracing::debug!(purged = report.purged, "purged finished resurface tasks");
        }
        Ok(report)
    }

    async fn fire_batch(&self, now: DateTime<Utc>, report: &mut PassReport) -> Result<(), PersistenceError> {
        for _ in 0..self.options.batch_size {
            let Some(task) = self.queue().claim_next(now)? else {
                break;
            };
            match self.fire(&task, now).await? {
                FireOutcome::Delivered => report.delivered += 1,
                FireOutcome::Cancelled => report.cancelled += 1,
                FireOutcome::Superseded => report.superseded += 1,
                FireOutcome::Retried => report.retried += 1,
                FireOutcome::Failed => report.failed += 1,
                FireOutcome::Stale => {}
            }
        }
        Ok(())
    }

    async fn fire(&self, task: &ResurfaceTask, now: DateTime<Utc>) -> Result<FireOutcome, PersistenceError> {
        let payload = match ResurfacePayload::decode(&task.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(task = %task.key, error = %e, "dropping resurface task with bad payload");
                let message = e.to_string();
                return self.finish(task, TaskState::Failed, Some(&message), now, FireOutcome::Failed);
            }
        };

        let Some(snooze_until) = payload.snooze_until() else {
            tracing::error!(task = %task.key, epoch = payload.snooze_until_epoch, "dropping resurface task with out-of-range time");
            return self.finish(task, TaskState::Failed, Some("snooze_until out of range"), now, FireOutcome::Failed);
        };

        let item: Option<SnoozedItem> = match self.store.get(&payload.item_id) {
            Ok(item) => item,
            Err(e) => {
                let message = e.to_string();
                self.queue().release(task, &message, now)?;
                return Err(e);
            }
        };

        let Some(item) = item else {
            tracing::info!(item_id = %payload.item_id, "item deleted before resurfacing");
            return self.finish(task, TaskState::Cancelled, None, now, FireOutcome::Cancelled);
        };

        if item.snooze_until != snooze_until {
            tracing::info!(
                item_id = %item.id,
                scheduled_for = %snooze_until,
                current = %item.snooze_until,
                "item changed after scheduling, skipping stale task"
            );
            return self.finish(task, TaskState::Superseded, None, now, FireOutcome::Superseded);
        }

        let notification = Resurfaced::from_item(&item);
        match self.notifier.notify(&notification).await {
            Ok(()) => {
                tracing::info!(item_id = %item.id, title = %notification.title, "item resurfaced");
                self.finish(task, TaskState::Delivered, None, now, FireOutcome::Delivered)
            }
            Err(e) if task.attempts >= self.options.max_fire_attempts => {
                tracing::error!(item_id = %item.id, attempts = task.attempts, error = %e, "giving up on resurfacing");
                let message = e.to_string();
                self.finish(task, TaskState::Failed, Some(&message), now, FireOutcome::Failed)
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, attempts = task.attempts, error = %e, "resurfacing failed, will retry");
                let message = e.to_string();
                if self.queue().release(task, &message, now)? {
                    Ok(FireOutcome::Retried)
                } else {
                    Ok(FireOutcome::Stale)
                }
            }
        }
    }

    fn finish(
        &self,
        task: &ResurfaceTask,
        state: TaskState,
        error: Option<&str>,
        now: DateTime<Utc>,
        outcome: FireOutcome,
    ) -> Result<FireOutcome, PersistenceError> {
        if self.queue().finish(task, state, error, now)? {
            Ok(outcome)
        } else {
            tracing::debug!(task = %task.key, "task changed while firing, leaving newer state");
            Ok(FireOutcome::Stale)
        }
    }

    /// Poll until `cancel` turns true.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> Result<(), PersistenceError> {
        tracing::info!(
            poll_interval_secs = self.options.poll_interval.as_secs(),
            batch_size = self.options.batch_size,
            "resurface worker started"
        );

        let mut polls: u64 = 0;
        loop {
            if *cancel.borrow() {
                break;
            }

            if polls % REARM_EVERY_POLLS == 0 {
                match self.rearm(Utc::now()) {
                    Ok(_) => {}
                    Err(CoreError::Persistence(PersistenceError::Poisoned)) => {
                        return Err(PersistenceError::Poisoned)
                    }
                    Err(e) => tracing::warn!(error = %e, "re-arming resurface tasks failed"),
                }
            }
            polls = polls.wrapping_add(1);

            match self.run_due(Utc::now()).await {
                Ok(report) if report.fired() > 0 || report.recovered > 0 => {
                    tracing::info!(
                        delivered = report.delivered,
                        cancelled = report.cancelled,
                        superseded = report.superseded,
                        retried = report.retried,
                        failed = report.failed,
                        "resurface pass complete"
                    );
                }
                Ok(_) => {}
                Err(PersistenceError::Poisoned) => return Err(PersistenceError::Poisoned),
                Err(e) => tracing::warn!(error = %e, "resurface pass failed"),
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(self.options.poll_interval) => {}
            }
        }

        tracing::info!("resurface worker stopped");
        Ok(())
    }
}
