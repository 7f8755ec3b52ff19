mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use cwtpick::PeakPickerCwt;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    // Override config with command line arguments if provided
    let config = config.with_cli_args(&args);
    info!("Parsed configuration: {:#?}", config);

    let picker = PeakPickerCwt::new(config.picker.clone())?;
    let spectra = processing::read_spectra(&args.input)?;
    let (results, summary) = processing::pick_spectra(&spectra, &picker, &config.output)?;
    info!("Picking summary:\n{}", summary);

    processing::write_peaks(&results, &config.output)?;
    Ok(())
}
