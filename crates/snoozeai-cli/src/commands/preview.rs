use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use snoozeai_core::item::snooze_after;
use snoozeai_core::quiet_hours::{parse_time, Zone};
use snoozeai_core::{Database, QuietHours, SettingsStore};

use super::{parse_when, CliResult};

#[derive(Args)]
pub struct PreviewArgs {
    /// Candidate time (RFC 3339 or "YYYY-MM-DD HH:MM" local); defaults to now + default snooze
    #[arg(long)]
    pub at: Option<String>,
    /// Override the stored window start (HH:MM)
    #[arg(long, requires = "end")]
    pub start: Option<String>,
    /// Override the stored window end (HH:MM)
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

fn time_arg(value: &str) -> Result<chrono::NaiveTime, String> {
    parse_time(value).ok_or_else(|| format!("invalid time '{value}', expected HH:MM"))
}

pub fn run(args: PreviewArgs) -> CliResult {
    let db = Arc::new(Database::open_default()?);
    let settings = SettingsStore::load(db)?.snapshot();

    let window = match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            let window = QuietHours::new(time_arg(start)?, time_arg(end)?);
            window.validate()?;
            window
        }
        _ => settings.quiet_hours,
    };

    let target = match &args.at {
        Some(at) => parse_when(at)?,
        None => snooze_after(Utc::now(), settings.default_snooze_minutes)?,
    };
    let adjusted = Zone::Local.adjust(target, Some(&window));

    println!("quiet hours: {}", window.label());
    println!("requested:   {}", Zone::Local.format(target));
    println!("resurfaces:  {}", Zone::Local.format(adjusted));
    Ok(())
}
