mod cli;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use docket_core::RunSummary;
use docket_engine::{
    reset_case_flags, Diagnostics, HarvestConfig, MySqlCaseStore, Notifier, Pipeline,
    PortalSettings, ReqwestPortal, Severity,
};
use engine_logging::{engine_error, engine_info, engine_warn};

const FLUSH_LIMIT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();
    engine_logging::initialize(args.log_destination(), args.log_level());

    let config = match HarvestConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            engine_error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let (notifier, _delivery) = match Notifier::from_config(&config.notify) {
        Ok(pair) => pair,
        Err(err) => {
            engine_error!("Cannot set up notifications: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let code = match harvest(&config, &notifier, args.skip_reset).await {
        Ok(summary) => {
            engine_info!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            notifier.notify(format!("Run aborted: {err:#}"), Severity::Error);
            ExitCode::FAILURE
        }
    };

    if !notifier.flush(FLUSH_LIMIT).await {
        engine_warn!("Notification queue did not drain within {:?}", FLUSH_LIMIT);
    }
    if notifier.dropped() > 0 {
        engine_warn!("{} notification(s) dropped", notifier.dropped());
    }
    code
}

async fn harvest(
    config: &HarvestConfig,
    notifier: &Notifier,
    skip_reset: bool,
) -> anyhow::Result<RunSummary> {
    let store = MySqlCaseStore::new(config.database.url.clone());

    if skip_reset {
        engine_info!("Keeping the existing case selection");
    } else {
        let today = chrono::Local::now().date_naive();
        let report = reset_case_flags(&store, today, notifier)
            .await
            .context("resetting case flags")?;
        engine_info!(
            "Selection reset: cutoff {}, {} selected, {} rejection(s) cleared",
            report.cutoff,
            report.selection.selected,
            report.rejections_cleared
        );
    }

    let diagnostics = Diagnostics::new(config.paths.diagnostics_dir.clone());
    let portal = ReqwestPortal::new(PortalSettings::from_config(config)?, diagnostics);
    let pipeline = Pipeline::new(config, &portal, &store, notifier.clone())?;
    let summary = pipeline.run().await?;
    Ok(summary)
}
