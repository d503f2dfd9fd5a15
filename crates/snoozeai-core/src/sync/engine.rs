//! Reconciliation of the local store with the backend listing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::merge::{decide_merge, local_only, merge};
use super::types::{MergeDecision, SyncReport, SyncStatus};
use crate::backend::{Backend, BackendGateway};
use crate::error::SyncError;
use crate::item::{next_resurfacing, SnoozedItem};
use crate::scheduler::ResurfaceScheduler;
use crate::storage::{SettingsStore, SnoozeItemStore};

/// Default number of remote items fetched per sync.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Pulls the remote listing and folds it into the local store.
///
/// Remote wins on conflict. Local-only items are never deleted.
pub struct ReconciliationSync<B> {
    gateway: Arc<BackendGateway<B>>,
    store: Arc<dyn SnoozeItemStore>,
    scheduler: ResurfaceScheduler,
    settings: Arc<SettingsStore>,
    page_limit: u32,
    running: tokio::sync::Mutex<()>,
    view: RwLock<Vec<SnoozedItem>>,
    status: RwLock<SyncStatus>,
}

impl<B: Backend> ReconciliationSync<B> {
    pub fn new(
        gateway: Arc<BackendGateway<B>>,
        store: Arc<dyn SnoozeItemStore>,
        scheduler: ResurfaceScheduler,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            gateway,
            store,
            scheduler,
            settings,
            page_limit: DEFAULT_PAGE_LIMIT,
            running: tokio::sync::Mutex::new(()),
            view: RwLock::new(Vec::new()),
            status: RwLock::new(SyncStatus::default()),
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    pub fn status(&self) -> SyncStatus {
        self.status.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Merged view from the last successful sync, in listing order.
    pub fn view(&self) -> Vec<SnoozedItem> {
        self.view.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Soonest pending item in the current view.
    pub fn next_resurfacing(&self, now: DateTime<Utc>) -> Option<SnoozedItem> {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        next_resurfacing(&view, now).cloned()
    }

    /// Seed the view from the local store without contacting the backend.
    pub fn load_view(&self) -> Result<usize, SyncError> {
        let items = self.store.list()?;
        let count = items.len();
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = items;
        Ok(count)
    }

    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.sync_at(Utc::now()).await
    }

    /// [`sync`](Self::sync) with an explicit clock.
    ///
    /// # Errors
    /// [`SyncError::InProgress`] if another sync holds the guard. Listing or
    /// store failures leave the view untouched and are recorded in
    /// [`SyncStatus::last_error`].
    pub async fn sync_at(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let _guard = self.running.try_lock().map_err(|_| SyncError::InProgress)?;
        self.update_status(|s| s.in_progress = true);

        let result = self.reconcile(now).await;
        match &result {
            Ok((report, merged)) => {
                let count = merged.len();
                self.update_status(|s| {
                    s.in_progress = false;
                    s.last_sync_at = Some(now);
                    s.last_error = None;
                    s.item_count = count;
                });
                tracing::info!(
                    fetched = report.fetched,
                    upserted = report.upserted,
                    skipped = report.skipped,
                    rescheduled = report.rescheduled,
                    local_only = report.local_only.len(),
                    "sync completed"
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "sync failed");
                self.update_status(|s| {
                    s.in_progress = false;
                    s.last_error = Some(message);
                });
            }
        }

        let (report, merged) = result?;
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = merged;
        Ok(report)
    }

    async fn reconcile(&self, now: DateTime<Utc>) -> Result<(SyncReport, Vec<SnoozedItem>), SyncError> {
        let listed = self.gateway.list(self.page_limit).await?;
        let mut report = SyncReport {
            fetched: listed.len(),
            ..SyncReport::default()
        };

        let mut remote = Vec::with_capacity(listed.len());
        for raw in listed {
            let id = raw.id.clone();
            match raw.into_item() {
                Some(item) => remote.push(item),
                None => {
                    tracing::warn!(item_id = %id, "skipping remote item with unparsable snoozeUntil");
                    report.skipped += 1;
                }
            }
        }

        let local = self.store.list()?;
        let local_by_id: HashMap<&str, &SnoozedItem> =
            local.iter().map(|item| (item.id.as_str(), item)).collect();
        let settings = self.settings.snapshot();

        for item in &remote {
            let reschedule = match decide_merge(local_by_id.get(item.id.as_str()).copied(), item) {
                MergeDecision::Unchanged => {
                    report.unchanged += 1;
                    continue;
                }
                MergeDecision::Insert => true,
                MergeDecision::UseRemote { resurface_changed } => resurface_changed,
            };

            self.store.upsert(item)?;
            report.upserted += 1;

            if reschedule && item.is_pending(now) {
                match self.scheduler.schedule_at(item, Some(&settings.quiet_hours), now) {
                    Ok(_) => report.rescheduled += 1,
                    Err(e) => {
                        tracing::warn!(item_id = %item.id, error = %e, "failed to schedule synced item");
                    }
                }
            }
        }

        report.local_only = local_only(&local, &remote);
        Ok((report, merge(&local, &remote)))
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        f(&mut self.status.write().unwrap_or_else(PoisonError::into_inner));
    }
}
