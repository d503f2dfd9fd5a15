//! Durable resurfacing.
//!
//! [`ResurfaceScheduler`] registers one task per item in the persistent
//! queue; [`ResurfaceWorker`] fires due tasks from a separate process (or
//! after a restart) using nothing but the database and a [`Notifier`].
//!
//! Task lifecycle:
//!
//! ```text
//! Scheduled -> Firing -> Delivered | Cancelled | Superseded | Failed
//!     ^          |
//!     +----------+  transient delivery failure, expired lease
//! ```

mod payload;
mod queue;
mod worker;

pub use payload::ResurfacePayload;
pub use queue::{task_key, QueueStats, ResurfaceQueue, ResurfaceTask, TaskState};
pub use worker::{
    Notifier, PassReport, Resurfaced, ResurfaceWorker, SnoozeAction, WorkerOptions, REARM_EVERY_POLLS,
    RESNOOZE_MINUTES,
};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, SchedulingError};
use crate::item::SnoozedItem;
use crate::quiet_hours::{QuietHours, Zone};
use crate::storage::{Database, SnoozeItemStore};

/// A registered resurface task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub item_id: String,
    pub key: String,
    pub generation: i64,
    pub fire_at: DateTime<Utc>,
    /// `fire_at - now`, never negative.
    #[serde(with = "duration_seconds")]
    pub delay: Duration,
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::seconds(i64::deserialize(d)?))
    }
}

/// Outcome of [`ResurfaceScheduler::rearm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RearmReport {
    pub examined: usize,
    pub rescheduled: usize,
    pub failed: usize,
}

/// Registers, replaces and cancels resurface tasks.
#[derive(Clone)]
pub struct ResurfaceScheduler {
    queue: ResurfaceQueue,
    zone: Zone,
}

impl ResurfaceScheduler {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            queue: ResurfaceQueue::new(db),
            zone: Zone::Local,
        }
    }

    /// Read quiet hours in `zone` instead of the system zone.
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    pub fn queue(&self) -> &ResurfaceQueue {
        &self.queue
    }

    /// Arrange exactly one future delivery for `item`.
    pub fn schedule(
        &self,
        item: &SnoozedItem,
        quiet_hours: Option<&QuietHours>,
    ) -> Result<ScheduledTask, SchedulingError> {
        self.schedule_at(item, quiet_hours, Utc::now())
    }

    /// [`schedule`](Self::schedule) with an explicit clock.
    ///
    /// Calling this again for the same item replaces the previous task.
    pub fn schedule_at(
        &self,
        item: &SnoozedItem,
        quiet_hours: Option<&QuietHours>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledTask, SchedulingError> {
        let target = self.zone.adjust(item.snooze_until, quiet_hours);
        let delay = (target - now).max(Duration::zero());

        let payload = ResurfacePayload::for_item(item, target)
            .encode()
            .map_err(|e| SchedulingError::Encode {
                item_id: item.id.clone(),
                message: e.to_string(),
            })?;

        let task = self
            .queue
            .upsert_scheduled(&item.id, &payload, target, now)
            .map_err(|source| SchedulingError::Register {
                item_id: item.id.clone(),
                source,
            })?;

        tracing::debug!(
            item_id = %item.id,
            generation = task.generation,
            fire_at = %task.fire_at,
            delay_secs = delay.num_seconds(),
            "resurface task scheduled"
        );

        Ok(ScheduledTask {
            item_id: item.id.clone(),
            key: task.key,
            generation: task.generation,
            fire_at: task.fire_at,
            delay,
        })
    }

    /// Cancel the item's pending task. Returns whether one was pending.
    pub fn cancel(&self, item_id: &str) -> Result<bool, PersistenceError> {
        let cancelled = self.queue.cancel(item_id, Utc::now())?;
        if cancelled {
            tracing::debug!(item_id, "resurface task cancelled");
        }
        Ok(cancelled)
    }

    /// Re-register every future item whose task is missing or finished, or
    /// whose payload no longer matches the item's time and text.
    ///
    /// Repairs registrations that failed after the item was persisted.
    pub fn rearm(
        &self,
        store: &dyn SnoozeItemStore,
        quiet_hours: Option<&QuietHours>,
        now: DateTime<Utc>,
    ) -> Result<RearmReport, PersistenceError> {
        let mut report = RearmReport::default();

        for item in store.list_pending(now)? {
            report.examined += 1;
            if !self.needs_rearm(&item)? {
                continue;
            }
            match self.schedule_at(&item, quiet_hours, now) {
                Ok(_) => report.rescheduled += 1,
                Err(e) => {
                    tracing::warn!(item_id = %item.id, error = %e, "failed to re-arm resurface task");
                    report.failed += 1;
                }
            }
        }

        if report.rescheduled > 0 || report.failed > 0 {
            tracing::info!(
                examined = report.examined,
                rescheduled = report.rescheduled,
                failed = report.failed,
                "re-armed resurface tasks"
            );
        }
        Ok(report)
    }

    fn needs_rearm(&self, item: &SnoozedItem) -> Result<bool, PersistenceError> {
        let Some(task) = self.queue.get(&item.id)? else {
            return Ok(true);
        };
        if task.state.is_terminal() {
            return Ok(true);
        }
        let matches_item = ResurfacePayload::decode(&task.payload)
            .map(|p| {
                p.snooze_until_epoch == item.snooze_until.timestamp()
                    && p.title == item.title
                    && p.summary == item.summary
            })
            .unwrap_or(false);
        Ok(!matches_item)
    }

    /// Return tasks stuck in `firing` for longer than `lease` to the queue.
    pub fn recover(&self, lease: Duration, now: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let stale_before = now.checked_sub_signed(lease).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let recovered = self.queue.recover_stale(stale_before, now)?;
        if recovered > 0 {
            tracing::warn!(recovered, "re-queued resurface tasks with expired lease");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Classification;
    use crate::storage::SqliteItemStore;
    use chrono::{FixedOffset, NaiveTime, TimeZone};

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn setup() -> (SqliteItemStore, ResurfaceScheduler) {
        let db = Arc::new(Database::open_memory().unwrap());
        let store = SqliteItemStore::new(db.clone());
        let scheduler = ResurfaceScheduler::new(db).with_zone(Zone::Fixed(zone()));
        (store, scheduler)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn item(id: &str, snooze_until: DateTime<Utc>) -> SnoozedItem {
        SnoozedItem {
            id: id.into(),
            title: "Title".into(),
            body: "Body".into(),
            summary: "Summary".into(),
            classification: Classification::Unclassified,
            snooze_until,
        }
    }

    #[test]
    fn schedule_applies_quiet_hours_and_computes_delay() {
        let (_store, scheduler) = setup();
        let qh = QuietHours::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
        );
        let task = scheduler.schedule_at(&item("a", at(23, 0)), Some(&qh), at(22, 0)).unwrap();

        assert_eq!(task.fire_at, Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap());
        assert_eq!(task.delay, Duration::minutes(570));
        assert_eq!(task.key, "resurface:a");

        let payload = ResurfacePayload::decode(&scheduler.queue().get("a").unwrap().unwrap().payload).unwrap();
        assert_eq!(payload.target_epoch, task.fire_at.timestamp());
        assert_eq!(payload.snooze_until_epoch, at(23, 0).timestamp());
    }

    #[test]
    fn past_target_has_zero_delay() {
        let (_store, scheduler) = setup();
        let task = scheduler.schedule_at(&item("a", at(9, 0)), None, at(10, 0)).unwrap();
        assert_eq!(task.delay, Duration::zero());
    }

    #[test]
    fn scheduling_twice_keeps_one_task() {
        let (_store, scheduler) = setup();
        scheduler.schedule_at(&item("a", at(13, 0)), None, at(12, 0)).unwrap();
        let second = scheduler.schedule_at(&item("a", at(14, 0)), None, at(12, 0)).unwrap();

        assert_eq!(second.generation, 2);
        let tasks = scheduler.queue().list().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].fire_at, at(14, 0));
    }

    #[test]
    fn rearm_registers_missing_and_outdated_tasks_only() {
        let (store, scheduler) = setup();
        let now = at(12, 0);

        let registered = item("registered", at(13, 0));
        store.upsert(&registered).unwrap();
        scheduler.schedule_at(&registered, None, now).unwrap();

        let missing = item("missing", at(14, 0));
        store.upsert(&missing).unwrap();

        let outdated = item("outdated", at(15, 0));
        scheduler.schedule_at(&outdated, None, now).unwrap();
        store.upsert(&item("outdated", at(16, 0))).unwrap();

        store.upsert(&item("past", at(11, 0))).unwrap();

        let report = scheduler.rearm(&store, None, now).unwrap();
        assert_eq!(report, RearmReport { examined: 3, rescheduled: 2, failed: 0 });
        assert_eq!(scheduler.queue().get("missing").unwrap().unwrap().fire_at, at(14, 0));
        assert_eq!(scheduler.queue().get("outdated").unwrap().unwrap().fire_at, at(16, 0));
        assert_eq!(scheduler.queue().get("registered").unwrap().unwrap().generation, 1);
        assert!(scheduler.queue().get("past").unwrap().is_none());

        let again = scheduler.rearm(&store, None, now).unwrap();
        assert_eq!(again.rescheduled, 0);
    }

    #[test]
    fn rearm_refreshes_payload_when_text_changes() {
        let (store, scheduler) = setup();
        let now = at(12, 0);

        let original = item("a", at(13, 0));
        store.upsert(&original).unwrap();
        scheduler.schedule_at(&original, None, now).unwrap();

        let renamed = SnoozedItem {
            title: "Renamed".into(),
            summary: "New summary".into(),
            ..original
        };
        store.upsert(&renamed).unwrap();

        let report = scheduler.rearm(&store, None, now).unwrap();
        assert_eq!(report.rescheduled, 1);
        let task = scheduler.queue().get("a").unwrap().unwrap();
        assert_eq!(task.generation, 2);
        let payload = ResurfacePayload::decode(&task.payload).unwrap();
        assert_eq!(payload.title, "Renamed");
        assert_eq!(payload.summary, "New summary");
    }

    #[test]
    fn recover_requeues_expired_claims() {
        let (_store, scheduler) = setup();
        scheduler.schedule_at(&item("a", at(13, 0)), None, at(12, 0)).unwrap();
        scheduler.queue().claim_next(at(13, 0)).unwrap().unwrap();

        assert_eq!(scheduler.recover(Duration::minutes(5), at(13, 1)).unwrap(), 0);
        assert_eq!(scheduler.recover(Duration::minutes(5), at(13, 10)).unwrap(), 1);
        assert_eq!(scheduler.queue().get("a").unwrap().unwrap().state, TaskState::Scheduled);
    }

    #[test]
    fn cancel_marks_task_cancelled() {
        let (_store, scheduler) = setup();
        scheduler.schedule_at(&item("a", at(13, 0)), None, at(12, 0)).unwrap();
        assert!(scheduler.cancel("a").unwrap());
        assert_eq!(scheduler.queue().get("a").unwrap().unwrap().state, TaskState::Cancelled);
        assert!(!scheduler.cancel("unknown").unwrap());
    }
}
