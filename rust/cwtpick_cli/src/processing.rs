use cwtpick::{
    AcquisitionLevel,
    AggregatedPickingSummary,
    PeakPickerCwt,
    PickedPeak,
    ProfileArrays,
};
use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{
    debug,
    info,
};

use crate::config::OutputConfig;
use crate::errors::CliError;

/// One profile spectrum as read from the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct SpectrumRecord {
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default)]
    pub retention_time: Option<f64>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

fn default_ms_level() -> u8 {
    1
}

/// Peaks of one input spectrum, as written to the output.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumPeaks {
    pub index: usize,
    pub ms_level: u8,
    pub retention_time: Option<f64>,
    pub peaks: Vec<PickedPeak>,
}

pub fn read_spectra(path: &Path) -> Result<Vec<SpectrumRecord>, CliError> {
    let st = Instant::now();
    let file = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
    let spectra: Vec<SpectrumRecord> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| CliError::ParseError { msg: e.to_string() })?;
    info!(
        "Loading {} spectra took: {:?} for {}",
        spectra.len(),
        st.elapsed(),
        path.display()
    );
    Ok(spectra)
}

/// Picks all the spectra, one chunk at a time. Parallelism happens
/// within each chunk.
pub fn pick_spectra(
    spectra: &[SpectrumRecord],
    picker: &PeakPickerCwt,
    output: &OutputConfig,
) -> Result<(Vec<SpectrumPeaks>, AggregatedPickingSummary), CliError> {
    let start = Instant::now();
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut results = Vec::new();
    let mut summary = AggregatedPickingSummary::new();
    for (chunk_num, chunk) in spectra
        .chunks(output.chunk_size)
        .progress_with_style(style)
        .enumerate()
    {
        let offset = chunk_num * output.chunk_size;
        let views = chunk
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let view = ProfileArrays::try_new(&spec.mz, &spec.intensity)
                    .map_err(|e| e.append_to_context(&format!(" in spectrum {}", offset + i)))?;
                Ok((view, AcquisitionLevel::from(spec.ms_level)))
            })
            .collect::<Result<Vec<_>, CliError>>()?;

        let (picked, chunk_summary) = picker.pick_experiment(&views);
        debug!(
            "Chunk {}: {} of {} spectra with peaks",
            chunk_num,
            picked.len(),
            chunk.len()
        );
        summary = summary.combine(&chunk_summary);

        for spec in picked {
            let record = &chunk[spec.index];
            let mut peaks = spec.peaks;
            if output.sort_peaks {
                peaks.sort_by(|a, b| a.position.total_cmp(&b.position));
            }
            results.push(SpectrumPeaks {
                index: offset + spec.index,
                ms_level: record.ms_level,
                retention_time: record.retention_time,
                peaks,
            });
        }
    }

    info!(
        "Picked {} spectra in {:?}",
        spectra.len(),
        start.elapsed()
    );
    Ok((results, summary))
}

pub fn write_peaks(results: &[SpectrumPeaks], output: &OutputConfig) -> Result<(), CliError> {
    let to_json = |writer: &mut dyn Write| -> Result<(), CliError> {
        let res = if output.pretty {
            serde_json::to_writer_pretty(&mut *writer, results)
        } else {
            serde_json::to_writer(&mut *writer, results)
        };
        res.map_err(|e| CliError::Io {
            source: e.to_string(),
            path: output
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        })?;
        writer.flush().map_err(|e| CliError::Io {
            source: e.to_string(),
            path: None,
        })
    };

    match &output.path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| CliError::io(e, path))?;
            let mut writer = std::io::BufWriter::new(file);
            to_json(&mut writer)?;
            info!("Wrote peaks of {} spectra to {}", results.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            to_json(&mut lock)?;
            writeln!(lock).map_err(|e| CliError::Io {
                source: e.to_string(),
                path: None,
            })?;
        }
    }
    Ok(())
}
