use std::io;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use gazetteer::config::load_user_config;
use gazetteer::errors::Result;
use gazetteer::etl::run_pipeline;

/// Builds the Hamburg gazetteer and links council documents to it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(default_value = "config/hamburg.json")]
    config: PathBuf,

    /// Remove cached stage outputs before running.
    #[arg(long)]
    clean: bool,
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let user_config = load_user_config(&args.config)?;
    setup_logging(&user_config.log_level);

    info!(config = args.config.display().to_string().as_str(), clean = args.clean; "Starting pipeline");
    run_pipeline(&user_config, args.clean)
}
