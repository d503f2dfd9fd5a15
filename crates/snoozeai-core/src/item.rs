//! Snoozed item model.

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Title used when the source notification has none.
pub const DEFAULT_TITLE: &str = "Notification";

/// Longest accepted snooze duration: one year.
pub const MAX_SNOOZE_MINUTES: i64 = 365 * 24 * 60;

/// Outcome of urgency classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "score", rename_all = "snake_case")]
pub enum Classification {
    /// Never classified (manual snooze, remote item without a score).
    #[default]
    Unclassified,
    /// Classifier score, clamped to `[0, 1]`.
    Classified(f64),
    /// Classifier answered with something that is not a score.
    Failed,
}

impl Classification {
    /// Build from a raw score, clamping into `[0, 1]`. NaN counts as a failure.
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() {
            Classification::Failed
        } else {
            Classification::Classified(score.clamp(0.0, 1.0))
        }
    }

    /// Interpret an optional score coming from storage or the backend listing.
    pub fn from_optional(score: Option<f64>) -> Self {
        score.map_or(Classification::Unclassified, Self::from_score)
    }

    /// The score, if classified.
    pub fn score(&self) -> Option<f64> {
        match self {
            Classification::Classified(s) => Some(*s),
            _ => None,
        }
    }

    /// Display bucket, if classified.
    pub fn bucket(&self) -> Option<UrgencyBucket> {
        self.score().map(UrgencyBucket::from_score)
    }

    pub(crate) fn as_db_str(&self) -> &'static str {
        match self {
            Classification::Unclassified => "unclassified",
            Classification::Classified(_) => "classified",
            Classification::Failed => "failed",
        }
    }

    pub(crate) fn from_db(state: Option<&str>, score: Option<f64>) -> Self {
        match state {
            Some("failed") => Classification::Failed,
            Some("unclassified") => Classification::Unclassified,
            _ => Classification::from_optional(score),
        }
    }
}

/// Urgency bucket shown next to a snoozed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBucket {
    Low,
    Medium,
    High,
}

impl UrgencyBucket {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            UrgencyBucket::High
        } else if score >= 0.4 {
            UrgencyBucket::Medium
        } else {
            UrgencyBucket::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UrgencyBucket::Low => "Low",
            UrgencyBucket::Medium => "Medium",
            UrgencyBucket::High => "High",
        }
    }
}

/// A notification deferred until `snooze_until`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnoozedItem {
    /// Client-generated identifier, stable across sync.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Backend summary. Manual snoozes use the body.
    pub summary: String,
    #[serde(default)]
    pub classification: Classification,
    /// Quiet-hours-corrected resurfacing instant.
    pub snooze_until: DateTime<Utc>,
}

impl SnoozedItem {
    /// Build an item with a fresh id, defaulting a blank title.
    pub fn new(
        title: &str,
        body: &str,
        summary: &str,
        classification: Classification,
        snooze_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_item_id(),
            title: title_or_default(title),
            body: body.to_string(),
            summary: summary.to_string(),
            classification,
            snooze_until: whole_seconds(snooze_until),
        }
    }

    /// Urgency score, if classified.
    pub fn urgency(&self) -> Option<f64> {
        self.classification.score()
    }

    /// Whether the item is still waiting to resurface at `now`.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.snooze_until > now
    }
}

/// Generate a fresh item id.
pub fn new_item_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Drop sub-second precision. Items are persisted with epoch seconds.
pub fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(0).unwrap_or(t)
}

/// Check a snooze duration in minutes.
///
/// # Errors
/// Rejects zero, negative, and durations above [`MAX_SNOOZE_MINUTES`].
pub fn validate_snooze_minutes(minutes: i64) -> Result<(), ValidationError> {
    if minutes <= 0 {
        return Err(ValidationError::NonPositiveMinutes(minutes));
    }
    if minutes > MAX_SNOOZE_MINUTES {
        return Err(ValidationError::InvalidValue {
            field: "minutes".into(),
            message: format!("must be at most {MAX_SNOOZE_MINUTES} (one year), got {minutes}"),
        });
    }
    Ok(())
}

/// `now` plus `minutes`, without panicking on overflow.
///
/// # Errors
/// Fails when the duration is invalid or the result is out of range.
pub fn snooze_after(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, ValidationError> {
    validate_snooze_minutes(minutes)?;
    TimeDelta::try_minutes(minutes)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "minutes".into(),
            message: format!("{minutes} minutes from {now} is out of range"),
        })
}

/// Trimmed title, or [`DEFAULT_TITLE`] when blank.
pub fn title_or_default(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sort in listing order: most recent `snooze_until` first, id as tie-break.
pub fn sort_for_listing(items: &mut [SnoozedItem]) {
    items.sort_by(|a, b| {
        b.snooze_until
            .cmp(&a.snooze_until)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// The soonest item that has not resurfaced yet.
///
/// Independent of listing order: filters `snooze_until > now` and takes the minimum.
pub fn next_resurfacing(items: &[SnoozedItem], now: DateTime<Utc>) -> Option<&SnoozedItem> {
    items
        .iter()
        .filter(|item| item.is_pending(now))
        .min_by_key(|item| item.snooze_until)
}
