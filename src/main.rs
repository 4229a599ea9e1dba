use std::process::ExitCode;

use boupy::cli::{dispatch, Cli};
use boupy::error::exit_code;
use clap::Parser;
use console::style;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::LevelFilter;

fn init_logging(verbose: u8) -> MultiProgress {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let logger = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .build();
    let max_level = logger.filter();
    let multi_progress = MultiProgress::new();
    if LogWrapper::new(multi_progress.clone(), logger).try_init().is_ok() {
        log::set_max_level(max_level);
    }
    multi_progress
}

#[tokio::main]
async fn main() -> ExitCode {
    #[cfg(feature = "console")]
    console_subscriber::init();

    let cli = Cli::parse();
    let multi_progress = init_logging(cli.verbose);

    let result = match cli.load_config() {
        Ok(config) => dispatch(cli.command, &config, &multi_progress).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}
