use async_trait::async_trait;
use chrono::Utc;
use clap::Args;
use snoozeai_core::quiet_hours::Zone;
use snoozeai_core::{Notifier, NotifyError, ResurfaceWorker, Resurfaced, WorkerOptions};
use tokio::sync::watch;

use super::{print_json, CliResult};
use crate::app::App;

#[derive(Args)]
pub struct WorkerArgs {
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,
    /// Print the pass report as JSON (with --once)
    #[arg(long, requires = "once")]
    pub json: bool,
}

/// Posts resurfaced items to stdout.
struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, n: &Resurfaced) -> Result<(), NotifyError> {
        let actions: Vec<&str> = n.actions.iter().map(|a| a.label.as_str()).collect();
        println!("[{}] {}", Zone::Local.format(n.snooze_until), n.title);
        println!("    {}", n.summary);
        println!("    id {} | {}", n.item_id, actions.join(" | "));
        Ok(())
    }
}

pub async fn run(args: WorkerArgs) -> CliResult {
    let app = App::open()?;
    let worker = ResurfaceWorker::new(
        app.db.clone(),
        ConsoleNotifier,
        WorkerOptions::from(&app.config.worker),
    );

    if args.once {
        let rearmed = worker.rearm(Utc::now())?;
        if rearmed.rescheduled > 0 {
            eprintln!("re-armed {} resurface task(s)", rearmed.rescheduled);
        }
        let report = worker.run_due(Utc::now()).await?;
        if args.json {
            return print_json(&report);
        }
        println!(
            "delivered {}, cancelled {}, superseded {}, retried {}, failed {}",
            report.delivered, report.cancelled, report.superseded, report.retried, report.failed
        );
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                tx.closed().await;
            }
        }
    });
    worker.run(rx).await?;
    Ok(())
}
