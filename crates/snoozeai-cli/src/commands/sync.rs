use super::{print_json, CliResult};
use crate::app::App;

pub async fn run(json: bool) -> CliResult {
    let app = App::open()?;
    let sync = app.sync()?;
    let report = sync.sync().await?;

    if json {
        return print_json(&report);
    }
    println!(
        "fetched {}, updated {}, unchanged {}, skipped {}, rescheduled {}",
        report.fetched, report.upserted, report.unchanged, report.skipped, report.rescheduled
    );
    if !report.local_only.is_empty() {
        println!("local only: {}", report.local_only.join(", "));
    }
    Ok(())
}
