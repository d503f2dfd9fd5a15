use super::CliResult;
use crate::app::App;

pub async fn run() -> CliResult {
    let app = App::open()?;
    let report = app.gateway()?.health().await?;

    if report.is_empty() {
        println!("backend reachable (no flags reported)");
    }
    for (flag, ok) in &report {
        println!("{flag}: {}", if *ok { "ok" } else { "FAIL" });
    }
    if report.values().any(|ok| !ok) {
        return Err("backend reports unhealthy components".into());
    }
    Ok(())
}
