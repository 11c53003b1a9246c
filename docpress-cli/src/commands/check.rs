//! Check command: run the pipeline and surface the report.

use super::run::{run_pipeline, RunSummary};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use docpress_core::Config;
use std::path::Path;

/// Run every stage without writing output and print diagnostics.
pub async fn check_site(
    config_path: &Path,
    now: DateTime<Utc>,
    json: bool,
    strict: bool,
) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let outcome = run_pipeline(&config, now).await?;
    let summary = RunSummary::new(&outcome.report, Vec::new());

    if json {
        let payload = serde_json::to_string_pretty(&summary)?;
        println!("{}", payload);
    } else {
        print!("{}", outcome.report);
    }

    if strict && summary.errors > 0 {
        bail!("{} documents failed to load or parse", summary.errors);
    }
    Ok(())
}
