use clap::Args;

use super::{print_item, print_json, CliResult};
use crate::app::App;

#[derive(Args)]
pub struct IngestArgs {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: IngestArgs) -> CliResult {
    let app = App::open()?;
    let ingested = app.pipeline()?.ingest(&args.title, &args.body).await?;

    if args.json {
        return print_json(&ingested);
    }
    print_item(&ingested.item);
    if let snoozeai_core::RemoteStatus::Failed(reason) = &ingested.remote {
        eprintln!("warning: backend store failed, kept locally ({reason})");
    }
    Ok(())
}
