use cwtpick::PickerConfig;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::path::{
    Path,
    PathBuf,
};

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub picker: PickerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output file, stdout when missing.
    pub path: Option<PathBuf>,
    /// Sort the peaks of every spectrum by position.
    pub sort_peaks: bool,
    /// Number of spectra handed to the thread pool at once.
    pub chunk_size: usize,
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            sort_peaks: false,
            chunk_size: 1024,
            pretty: false,
        }
    }
}

impl Config {
    /// Parses a config of the form `{"picker": {...}, "output": {...}}`,
    /// both sections are optional.
    pub fn from_json_value(mut value: Value) -> Result<Self, CliError> {
        let picker = match value.get_mut("picker") {
            Some(x) => PickerConfig::from_json_value(x.take())?,
            None => PickerConfig::default(),
        };
        let output = match value.get_mut("output") {
            Some(x) if !x.is_null() => {
                serde_json::from_value(x.take()).map_err(|e| CliError::ParseError {
                    msg: e.to_string(),
                })?
            }
            _ => OutputConfig::default(),
        };
        if output.chunk_size == 0 {
            return Err(CliError::Config {
                source: "output.chunk_size must be > 0".to_string(),
            });
        }
        Ok(Self { picker, output })
    }

    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let file = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
        let value: Value = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| CliError::ParseError { msg: e.to_string() })?;
        Self::from_json_value(value)
    }

    /// Overrides the config values with the ones given on the command line.
    pub fn with_cli_args(mut self, args: &Cli) -> Self {
        if args.optimize {
            self.picker.optimization.enabled = true;
        }
        if args.sort {
            self.output.sort_peaks = true;
        }
        if let Some(output) = &args.output {
            self.output.path = Some(output.clone());
        }
        self
    }
}
