//! Quiet hours policy.
//!
//! A quiet-hours window is a recurring daily wall-clock range during which
//! nothing resurfaces. [`adjust`] moves an instant that falls inside the
//! window to the moment the window ends, in the caller's time zone.
//!
//! Windows may cross midnight (e.g. 22:00 - 07:30). A window whose start
//! equals its end is empty and never quiet.

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Daily quiet-hours window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        }
    }
}

impl QuietHours {
    /// Create an enabled window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    /// Same window, disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the window wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Reject an enabled window that cannot mean anything.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.start == self.end {
            return Err(ValidationError::EmptyQuietWindow(format_time(self.start)));
        }
        Ok(())
    }

    /// `HH:MM - HH:MM` label, or `off`.
    pub fn label(&self) -> String {
        if self.enabled {
            format!("{} - {}", format_time(self.start), format_time(self.end))
        } else {
            "off".to_string()
        }
    }
}

/// Whether a wall-clock time falls inside the window. Ignores `enabled`.
pub fn is_quiet(t: NaiveTime, quiet_hours: &QuietHours) -> bool {
    let (start, end) = (quiet_hours.start, quiet_hours.end);
    if start < end {
        start <= t && t < end
    } else if start > end {
        t >= start || t < end
    } else {
        false
    }
}

/// Move `target` out of the quiet window, interpreting wall-clock times in `zone`.
///
/// Returns `target` unchanged when quiet hours are absent, disabled, or when
/// the target's local time is outside the window. Otherwise returns the next
/// occurrence of the window's end: the same local date, except for a window
/// crossing midnight where the target is in the evening part (`t >= start`),
/// which ends on the following date.
pub fn adjust<Tz: TimeZone>(
    target: DateTime<Utc>,
    quiet_hours: Option<&QuietHours>,
    zone: &Tz,
) -> DateTime<Utc> {
    let Some(qh) = quiet_hours.filter(|qh| qh.enabled) else {
        return target;
    };

    let local = target.with_timezone(zone).naive_local();
    let t = local.time();
    if !is_quiet(t, qh) {
        return target;
    }

    let end_date = if qh.crosses_midnight() && t >= qh.start {
        match local.date().succ_opt() {
            Some(next) => next,
            None => return target,
        }
    } else {
        local.date()
    };

    resolve_local(zone, end_date, qh.end).unwrap_or(target)
}

/// Zone in which quiet hours are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The system's local zone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl Zone {
    /// [`adjust`] in this zone.
    pub fn adjust(&self, target: DateTime<Utc>, quiet_hours: Option<&QuietHours>) -> DateTime<Utc> {
        match self {
            Zone::Local => adjust(target, quiet_hours, &Local),
            Zone::Fixed(offset) => adjust(target, quiet_hours, offset),
        }
    }

    /// `YYYY-MM-DD HH:MM` in this zone.
    pub fn format(&self, t: DateTime<Utc>) -> String {
        const FMT: &str = "%Y-%m-%d %H:%M";
        match self {
            Zone::Local => t.with_timezone(&Local).format(FMT).to_string(),
            Zone::Fixed(offset) => t.with_timezone(offset).format(FMT).to_string(),
        }
    }
}

/// Map a local date and time to an instant.
///
/// Ambiguous times (fall-back) take the earliest instant; times inside a
/// spring-forward gap take the first valid minute after the gap.
fn resolve_local<Tz: TimeZone>(zone: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let mut naive = NaiveDateTime::new(date, time);
    // Gaps are at most a few hours; bail out after a day of probing.
    for _ in 0..(24 * 60) {
        if let Some(dt) = zone.from_local_datetime(&naive).earliest() {
            return Some(dt.with_timezone(&Utc));
        }
        naive += Duration::minutes(1);
    }
    None
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Format as `HH:MM`.
pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}
