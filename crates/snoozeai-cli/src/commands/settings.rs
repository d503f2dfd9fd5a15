use clap::Subcommand;
use snoozeai_core::quiet_hours::parse_time;
use snoozeai_core::storage::settings::split_hints;
use snoozeai_core::QuietHours;

use super::{print_json, CliResult};
use crate::app::App;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show current settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Enable quiet hours for a daily window (HH:MM HH:MM)
    Quiet { start: String, end: String },
    /// Disable quiet hours, keeping the window
    QuietOff,
    /// Default snooze duration in minutes
    Minutes { minutes: i64 },
    /// Comma-separated classifier hints (empty string clears)
    Hints { hints: String },
}

fn time_arg(value: &str) -> Result<chrono::NaiveTime, String> {
    parse_time(value).ok_or_else(|| format!("invalid time '{value}', expected HH:MM"))
}

pub fn run(action: SettingsAction) -> CliResult {
    let app = App::open()?;
    let settings = &app.settings;

    match action {
        SettingsAction::Show { json } => {
            let current = settings.snapshot();
            if json {
                return print_json(&*current);
            }
            println!("quiet hours:     {}", current.quiet_hours.label());
            println!("default snooze:  {} min", current.default_snooze_minutes);
            println!("hints:           {}", current.hints.join(", "));
        }
        SettingsAction::Quiet { start, end } => {
            let window = QuietHours::new(time_arg(&start)?, time_arg(&end)?);
            settings.set_quiet_hours(window)?;
            println!("quiet hours: {}", window.label());
        }
        SettingsAction::QuietOff => {
            let window = settings.snapshot().quiet_hours.disabled();
            settings.set_quiet_hours(window)?;
            println!("quiet hours: off");
        }
        SettingsAction::Minutes { minutes } => {
            settings.set_default_snooze_minutes(minutes)?;
            println!("default snooze: {minutes} min");
        }
        SettingsAction::Hints { hints } => {
            settings.set_hints(split_hints(&hints))?;
            println!("hints: {}", settings.snapshot().hints.join(", "));
        }
    }
    Ok(())
}
