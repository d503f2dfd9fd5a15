use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use snoozeai_core::item::{next_resurfacing, snooze_after, sort_for_listing};
use snoozeai_core::{CoreError, SnoozeItemStore};

use super::{parse_when, print_item, print_json, CliResult};
use crate::app::App;

/// When an item should resurface.
#[derive(Args)]
pub struct When {
    /// Absolute time (RFC 3339 or "YYYY-MM-DD HH:MM" local)
    #[arg(long, conflicts_with = "minutes")]
    pub at: Option<String>,
    /// Minutes from now
    #[arg(long)]
    pub minutes: Option<i64>,
}

impl When {
    fn resolve(&self, default_minutes: i64) -> Result<Option<DateTime<Utc>>, String> {
        match (&self.at, self.minutes) {
            (Some(at), _) => parse_when(at).map(Some),
            (None, Some(minutes)) => snooze_after(Utc::now(), minutes)
                .map(Some)
                .map_err(|e| format!("--minutes: {e}")),
            (None, None) if default_minutes > 0 => Ok(None),
            (None, None) => Err("no default snooze duration configured".into()),
        }
    }
}

#[derive(Subcommand)]
pub enum SnoozeAction {
    /// Snooze a manual reminder
    New {
        title: String,
        body: String,
        #[command(flatten)]
        when: When,
    },
    /// Change an item's text or time
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[command(flatten)]
        when: When,
    },
    /// Delete an item and cancel its resurfacing
    Delete { id: String },
    /// Snooze an item again for N minutes
    Resnooze { id: String, minutes: i64 },
    /// List items, latest resurfacing first
    List {
        #[arg(long)]
        json: bool,
        /// Show only the next item to resurface
        #[arg(long)]
        next: bool,
    },
}

pub async fn run(action: SnoozeAction) -> CliResult {
    let app = App::open()?;
    let default_minutes = app.settings.snapshot().default_snooze_minutes;

    match action {
        SnoozeAction::New { title, body, when } => {
            let snooze_until = match when.resolve(default_minutes)? {
                Some(at) => at,
                None => snooze_after(Utc::now(), default_minutes)?,
            };
            let created = app.pipeline()?.create(&title, &body, snooze_until).await?;
            print_item(&created.item);
        }
        SnoozeAction::Edit { id, title, body, when } => {
            let current = app.store.get(&id)?.ok_or_else(|| CoreError::NotFound(id.clone()))?;
            let snooze_until = when.resolve(default_minutes)?.unwrap_or(current.snooze_until);
            let edited = app
                .pipeline()?
                .edit(
                    &id,
                    title.as_deref().unwrap_or(&current.title),
                    body.as_deref().unwrap_or(&current.body),
                    snooze_until,
                )
                .await?;
            print_item(&edited.item);
        }
        SnoozeAction::Delete { id } => {
            app.pipeline()?.delete(&id)?;
            println!("deleted {id}");
        }
        SnoozeAction::Resnooze { id, minutes } => {
            let resnoozed = app.pipeline()?.resnooze(&id, minutes).await?;
            print_item(&resnoozed.item);
        }
        SnoozeAction::List { json, next } => {
            let mut items = app.store.list()?;
            sort_for_listing(&mut items);
            if next {
                let upcoming = next_resurfacing(&items, Utc::now()).cloned();
                return match (json, upcoming) {
                    (true, upcoming) => print_json(&upcoming),
                    (false, Some(item)) => {
                        print_item(&item);
                        Ok(())
                    }
                    (false, None) => {
                        println!("nothing pending");
                        Ok(())
                    }
                };
            }
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("no snoozed items");
            }
            for item in &items {
                print_item(item);
            }
        }
    }
    Ok(())
}
