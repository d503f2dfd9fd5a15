//! Ingestion and user snooze flows.
//!
//! Every flow follows the same order: compute the quiet-hours-adjusted
//! `snooze_until`, push to the backend (best effort), persist locally,
//! then register the resurface task. Persistence always happens before
//! scheduling, so a registered task can always find its item.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendGateway};
use crate::error::{CoreError, Result, ValidationError};
use crate::item::{snooze_after, whole_seconds, Classification, SnoozedItem};
use crate::quiet_hours::Zone;
use crate::scheduler::{ResurfaceScheduler, ScheduledTask};
use crate::storage::{SettingsStore, SnoozeItemStore};

/// Whether the backend accepted the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RemoteStatus {
    Stored,
    /// Kept locally only; the next successful store or sync will catch up.
    Failed(String),
}

/// An item that was persisted and scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingested {
    pub item: SnoozedItem,
    pub remote: RemoteStatus,
    pub task: ScheduledTask,
}

/// Turns notifications and user actions into persisted, scheduled items.
pub struct IngestionPipeline<B> {
    gateway: Arc<BackendGateway<B>>,
    store: Arc<dyn SnoozeItemStore>,
    scheduler: ResurfaceScheduler,
    settings: Arc<SettingsStore>,
    summary_max_tokens: u32,
    zone: Zone,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankField(field))
    } else {
        Ok(())
    }
}

impl<B: Backend> IngestionPipeline<B> {
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
            summary_max_tokens: 80,
            zone: Zone::Local,
        }
    }

    pub fn with_summary_max_tokens(mut self, max_tokens: u32) -> Self {
        self.summary_max_tokens = max_tokens;
        self
    }

    /// Read quiet hours in `zone` instead of the system zone.
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self.scheduler = self.scheduler.with_zone(zone);
        self
    }

    /// Summarize, classify, and snooze an incoming notification.
    ///
    /// # Errors
    /// - `Validation` if both title and body are blank (no network call is made)
    /// - `Backend` if summarize or classify exhausts its retries (nothing is persisted)
    /// - `Persistence` if the local write fails
    /// - `Scheduling` if the task cannot be registered (the item is already persisted)
    pub async fn ingest(&self, title: &str, body: &str) -> Result<Ingested> {
        self.ingest_at(title, body, Utc::now()).await
    }

    pub async fn ingest_at(&self, title: &str, body: &str, now: DateTime<Utc>) -> Result<Ingested> {
        let text = if body.trim().is_empty() { title } else { body };
        require(text, "body")?;

        let settings = self.settings.snapshot();

        let (summary, classification) = tokio::join!(
            self.gateway.summarize(text, Some(self.summary_max_tokens)),
            self.gateway.classify(text, &settings.hints),
        );
        let summary = summary?;
        let classification = classification?.classification;
        if classification == Classification::Failed {
            tracing::warn!("classifier returned an unusable urgency");
        }

        let raw_target = snooze_after(now, settings.default_snooze_minutes)?;
        let snooze_until = self.zone.adjust(raw_target, Some(&settings.quiet_hours));

        let body = if body.trim().is_empty() { summary.as_str() } else { body };
        let item = SnoozedItem::new(title, body, &summary, classification, snooze_until);

        let ingested = self.persist_and_schedule(item, now).await?;
        tracing::info!(
            item_id = %ingested.item.id,
            snooze_until = %ingested.item.snooze_until,
            urgency = ?ingested.item.urgency(),
            "notification snoozed"
        );
        Ok(ingested)
    }

    /// Snooze a user-written item until `snooze_until` (quiet-hours adjusted).
    pub async fn create(&self, title: &str, body: &str, snooze_until: DateTime<Utc>) -> Result<Ingested> {
        self.create_at(title, body, snooze_until, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        title: &str,
        body: &str,
        snooze_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Ingested> {
        require(title, "title")?;
        require(body, "body")?;

        let settings = self.settings.snapshot();
        let snooze_until = self.zone.adjust(snooze_until, Some(&settings.quiet_hours));
        let item = SnoozedItem::new(title, body, body, Classification::Unclassified, snooze_until);
        self.persist_and_schedule(item, now).await
    }

    /// Change an item's text and time. Its previous task is superseded.
    pub async fn edit(
        &self,
        id: &str,
        title: &str,
        body: &str,
        snooze_until: DateTime<Utc>,
    ) -> Result<Ingested> {
        self.edit_at(id, title, body, snooze_until, Utc::now()).await
    }

    pub async fn edit_at(
        &self,
        id: &str,
        title: &str,
        body: &str,
        snooze_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Ingested> {
        require(title, "title")?;
        require(body, "body")?;

        let existing = self
            .store
            .get(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let settings = self.settings.snapshot();
        let item = SnoozedItem {
            title: title.trim().to_string(),
            body: body.to_string(),
            snooze_until: whole_seconds(self.zone.adjust(snooze_until, Some(&settings.quiet_hours))),
            ..existing
        };
        self.persist_and_schedule(item, now).await
    }

    /// Snooze an existing item again for `minutes` from now.
    pub async fn resnooze(&self, id: &str, minutes: i64) -> Result<Ingested> {
        self.resnooze_at(id, minutes, Utc::now()).await
    }

    pub async fn resnooze_at(&self, id: &str, minutes: i64, now: DateTime<Utc>) -> Result<Ingested> {
        let target = snooze_after(now, minutes)?;
        let mut item = self
            .store
            .get(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let settings = self.settings.snapshot();
        item.snooze_until = whole_seconds(self.zone.adjust(target, Some(&settings.quiet_hours)));
        self.persist_and_schedule(item, now).await
    }

    /// Delete an item and cancel its task.
    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete(id)?;
        self.scheduler.cancel(id)?;
        if !removed {
            return Err(CoreError::NotFound(id.to_string()));
        }
        tracing::info!(item_id = id, "snoozed item deleted");
        Ok(())
    }

    async fn persist_and_schedule(&self, item: SnoozedItem, now: DateTime<Utc>) -> Result<Ingested> {
        let remote = match self.gateway.store(&item).await {
            Ok(()) => RemoteStatus::Stored,
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "backend store failed, keeping item locally");
                RemoteStatus::Failed(e.to_string())
            }
        };

        self.store.upsert(&item)?;

        // Re-read quiet hours: they may have changed while the backend call was in flight.
        let settings = self.settings.snapshot();
        let task = self.scheduler.schedule_at(&item, Some(&settings.quiet_hours), now)?;

        Ok(Ingested { item, remote, task })
    }
}
