use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON file with the profile spectra
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the output file, peaks are written to stdout when missing
    /// (will over-write the config file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Refine the picked peaks jointly (will over-write the config file)
    #[arg(long)]
    pub optimize: bool,

    /// Sort the peaks of every spectrum by position
    #[arg(short, long)]
    pub sort: bool,
}
