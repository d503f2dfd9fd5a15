//! User settings: quiet hours, default snooze duration, classification hints.
//!
//! Settings are persisted in the `kv` table and published through a
//! `tokio::sync::watch` channel. Readers take a snapshot per operation and
//! never hold one across an await point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::Database;
use crate::error::CoreError;
use crate::item::validate_snooze_minutes;
use crate::quiet_hours::{format_time, parse_time, QuietHours};

const KEY_QUIET_ENABLED: &str = "quiet_enabled";
const KEY_QUIET_START: &str = "quiet_start";
const KEY_QUIET_END: &str = "quiet_end";
const KEY_DEFAULT_MINUTES: &str = "default_snooze_minutes";
const KEY_HINTS: &str = "hints_csv";

/// Default snooze duration in minutes.
pub const DEFAULT_SNOOZE_MINUTES: i64 = 60;

/// Immutable settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub quiet_hours: QuietHours,
    pub default_snooze_minutes: i64,
    /// Free-text hints for the classifier, trimmed and non-empty.
    pub hints: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quiet_hours: QuietHours::default(),
            default_snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            hints: Vec::new(),
        }
    }
}

/// Split a comma-joined hint list, trimming and dropping empty entries.
pub fn split_hints(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize user-provided hints the same way [`split_hints`] does.
///
/// Commas inside a hint would not survive the CSV encoding, so a hint
/// containing one is split.
pub fn normalize_hints<I, S>(hints: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hints
        .into_iter()
        .flat_map(|h| split_hints(h.as_ref()))
        .collect()
}

/// Persistent, observable settings.
pub struct SettingsStore {
    db: Arc<Database>,
    tx: watch::Sender<Arc<Settings>>,
}

impl SettingsStore {
    /// Load settings from the database and start publishing them.
    ///
    /// # Errors
    /// Returns an error if the kv table cannot be read.
    pub fn load(db: Arc<Database>) -> Result<Self, CoreError> {
        let settings = read_settings(&db)?;
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Ok(Self { db, tx })
    }

    /// Latest settings.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Re-read from the database, picking up writes from other processes.
    pub fn reload(&self) -> Result<Arc<Settings>, CoreError> {
        let settings = Arc::new(read_settings(&self.db)?);
        self.tx.send_if_modified(|current| {
            if **current == *settings {
                false
            } else {
                *current = settings.clone();
                true
            }
        });
        Ok(settings)
    }

    /// Replace the quiet-hours window.
    ///
    /// # Errors
    /// Rejects an enabled window whose start equals its end.
    pub fn set_quiet_hours(&self, quiet_hours: QuietHours) -> Result<(), CoreError> {
        quiet_hours.validate()?;
        self.db.kv_set_many(&[
            (KEY_QUIET_ENABLED, quiet_hours.enabled.to_string()),
            (KEY_QUIET_START, format_time(quiet_hours.start)),
            (KEY_QUIET_END, format_time(quiet_hours.end)),
        ])?;
        self.publish(|s| s.quiet_hours = quiet_hours);
        Ok(())
    }

    /// Replace the default snooze duration.
    ///
    /// # Errors
    /// Rejects zero, negative, and durations longer than a year.
    pub fn set_default_snooze_minutes(&self, minutes: i64) -> Result<(), CoreError> {
        validate_snooze_minutes(minutes)?;
        self.db.kv_set(KEY_DEFAULT_MINUTES, &minutes.to_string())?;
        self.publish(|s| s.default_snooze_minutes = minutes);
        Ok(())
    }

    /// Replace the classification hints.
    pub fn set_hints<I, S>(&self, hints: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hints = normalize_hints(hints);
        self.db.kv_set(KEY_HINTS, &hints.join(","))?;
        self.publish(|s| s.hints = hints);
        Ok(())
    }

    fn publish(&self, update: impl FnOnce(&mut Settings)) {
        self.tx.send_modify(|current| {
            let mut next = (**current).clone();
            update(&mut next);
            *current = Arc::new(next);
        });
    }
}

fn read_settings(db: &Database) -> Result<Settings, CoreError> {
    let defaults = Settings::default();

    let enabled = match db.kv_get(KEY_QUIET_ENABLED)? {
        Some(v) => v.parse::<bool>().unwrap_or_else(|_| {
            tracing::warn!(key = KEY_QUIET_ENABLED, value = %v, "invalid setting, using default");
            defaults.quiet_hours.enabled
        }),
        None => defaults.quiet_hours.enabled,
    };
    let start = read_time(db, KEY_QUIET_START)?.unwrap_or(defaults.quiet_hours.start);
    let end = read_time(db, KEY_QUIET_END)?.unwrap_or(defaults.quiet_hours.end);

    let default_snooze_minutes = match db.kv_get(KEY_DEFAULT_MINUTES)? {
        Some(v) => match v.trim().parse::<i64>() {
            Ok(m) if validate_snooze_minutes(m).is_ok() => m,
            _ => {
                tracing::warn!(key = KEY_DEFAULT_MINUTES, value = %v, "invalid setting, using default");
                defaults.default_snooze_minutes
            }
        },
        None => defaults.default_snooze_minutes,
    };

    let hints = db
        .kv_get(KEY_HINTS)?
        .map(|csv| split_hints(&csv))
        .unwrap_or_default();

    Ok(Settings {
        quiet_hours: QuietHours { enabled, start, end },
        default_snooze_minutes,
        hints,
    })
}

fn read_time(db: &Database, key: &str) -> Result<Option<chrono::NaiveTime>, CoreError> {
    Ok(db.kv_get(key)?.and_then(|v| {
        let parsed = parse_time(&v);
        if parsed.is_none() {
            tracing::warn!(key, value = %v, "invalid time setting, using default");
        }
        parsed
    }))
}
