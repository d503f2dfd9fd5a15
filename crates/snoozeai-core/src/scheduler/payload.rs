//! Serialized deferred-task message.
//!
//! The worker rebuilds everything it needs from this payload plus a fresh
//! store lookup; nothing from the scheduling process is shared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::item::SnoozedItem;

/// Deferred "resurface this item" message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResurfacePayload {
    pub item_id: String,
    pub title: String,
    pub summary: String,
    /// Quiet-hours-adjusted fire instant, epoch seconds.
    pub target_epoch: i64,
    /// The item's `snooze_until` when scheduled, epoch seconds.
    pub snooze_until_epoch: i64,
}

#[derive(Deserialize)]
struct RawPayload {
    item_id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    target_epoch: Option<i64>,
    snooze_until_epoch: Option<i64>,
}

impl ResurfacePayload {
    pub fn for_item(item: &SnoozedItem, target: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            summary: item.summary.clone(),
            target_epoch: target.timestamp(),
            snooze_until_epoch: item.snooze_until.timestamp(),
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored payload.
    ///
    /// `item_id`, `title`, `summary` and `target_epoch` are required;
    /// `snooze_until_epoch` defaults to `target_epoch`.
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let raw: RawPayload = serde_json::from_str(raw)?;

        let item_id = raw
            .item_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(PayloadError::MissingField("item_id"))?;
        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(PayloadError::MissingField("title"))?;
        let summary = raw.summary.ok_or(PayloadError::MissingField("summary"))?;
        let target_epoch = raw
            .target_epoch
            .ok_or(PayloadError::MissingField("target_epoch"))?;

        Ok(Self {
            item_id,
            title,
            summary,
            target_epoch,
            snooze_until_epoch: raw.snooze_until_epoch.unwrap_or(target_epoch),
        })
    }

    /// The item's `snooze_until`, re-derived from the stored epoch.
    pub fn snooze_until(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.snooze_until_epoch, 0)
    }

    pub fn target(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.target_epoch, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_requires_core_fields() {
        assert_eq!(
            ResurfacePayload::decode(r#"{"item_id":"a","summary":"s","target_epoch":1}"#),
            Err(PayloadError::MissingField("title"))
        );
        assert_eq!(
            ResurfacePayload::decode(r#"{"item_id":"a","title":"t","summary":"s"}"#),
            Err(PayloadError::MissingField("target_epoch"))
        );
        assert_eq!(
            ResurfacePayload::decode(r#"{"item_id":"","title":"t","summary":"s","target_epoch":1}"#),
            Err(PayloadError::MissingField("item_id"))
        );
        assert!(matches!(
            ResurfacePayload::decode("{not json"),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn snooze_until_defaults_to_target() {
        let p = ResurfacePayload::decode(
            r#"{"item_id":"a","title":"t","summary":"","target_epoch":1741676400}"#,
        )
        .unwrap();
        assert_eq!(p.snooze_until_epoch, 1741676400);
        assert_eq!(p.snooze_until().unwrap().timestamp(), 1741676400);
    }
}
