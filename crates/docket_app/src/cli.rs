use std::path::PathBuf;

use clap::Parser;
use engine_logging::LogDestination;
use log::LevelFilter;

/// Download the combined docket PDF of every case selected for today's run.
#[derive(Debug, Parser)]
#[command(name = "docket-harvester", version)]
pub struct Args {
    /// RON configuration file.
    #[arg(short, long, default_value = "harvester.ron")]
    pub config: PathBuf,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Keep the current case selection instead of recomputing it.
    #[arg(long)]
    pub skip_reset: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
