mod bootstrap;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use monitor_core::settings::Settings;
use monitor_runtime::notifier::setup_sender;
use monitor_runtime::orchestrator::{report_config_error, MonitorRun, RunOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    bootstrap::setup_logging(settings.effective_log_level())?;

    tracing::info!("Analytics monitor v{} starting", env!("CARGO_PKG_VERSION"));

    // Built before validation so a configuration error can still be reported.
    let sender = setup_sender(&settings);
    let config = match settings.into_config() {
        Ok(config) => config,
        Err(e) => {
            report_config_error(sender, &e).await;
            return Ok(());
        }
    };

    tracing::info!(
        "Mode: {}, countries: {}, dry run: {}",
        config.counting_mode,
        config.monitor_countries.join(", "),
        config.dry_run
    );

    match MonitorRun::from_config(&config).run_once(Utc::now()).await {
        RunOutcome::Completed(report) => {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                "analytics monitor run finished"
            );
        }
        RunOutcome::Failed { reported, .. } => {
            tracing::info!(error_reported = reported, "analytics monitor run finished with errors");
        }
    }

    Ok(())
}
