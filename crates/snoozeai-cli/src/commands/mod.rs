pub mod config;
pub mod health;
pub mod ingest;
pub mod preview;
pub mod settings;
pub mod snooze;
pub mod sync;
pub mod worker;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use snoozeai_core::quiet_hours::Zone;
use snoozeai_core::SnoozedItem;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Parse RFC 3339, or `YYYY-MM-DD HH:MM` in the local zone.
pub fn parse_when(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .map_err(|_| format!("invalid time '{value}', expected RFC 3339 or 'YYYY-MM-DD HH:MM'"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| format!("'{value}' does not exist in the local time zone"))
}

pub fn print_item(item: &SnoozedItem) {
    let urgency = item
        .classification
        .bucket()
        .map_or("-", |bucket| bucket.label());
    println!(
        "{}  {}  [{}]  {}",
        Zone::Local.format(item.snooze_until),
        item.id,
        urgency,
        item.title
    );
    if !item.summary.is_empty() {
        println!("    {}", item.summary);
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
