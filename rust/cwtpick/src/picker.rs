//! Depletion loop driving the whole picking pipeline.
//!
//! Every sweep transforms the working signal, then walks the transform
//! forward: each candidate maximum gets its region resolved, fitted and
//! gated, and the region is zeroed whatever the outcome. Sweeps repeat
//! until one of them accepts nothing. The accepted shapes can then be
//! refined jointly against the untouched signal.
//!
//! ```
//! use cwtpick::{AcquisitionLevel, PeakPickerCwt, PickerConfig};
//!
//! let mut config = PickerConfig::default();
//! config.wavelet.scale = 0.05;
//! config.thresholds.peak_bound = 20.0;
//! config.thresholds.fwhm = 0.01;
//! let picker = PeakPickerCwt::new(config).unwrap();
//!
//! let signal: Vec<(f64, f64)> = (0..1001)
//!     .map(|i| {
//!         let x = 499.5 + i as f64 * 0.001;
//!         (x, 100.0 / (1.0 + ((x - 500.0) / 0.025).powi(2)))
//!     })
//!     .collect();
//! let peaks = picker.pick(&signal, AcquisitionLevel::Primary);
//! assert_eq!(peaks.len(), 1);
//! assert!((peaks[0].position - 500.0).abs() < 0.01);
//! ```

use std::fmt::Display;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{
    debug,
    trace,
};

use crate::centroid::centroid_position;
use crate::config::PickerConfig;
use crate::endpoints::resolve_endpoints;
use crate::errors::ConfigError;
use crate::fitting::fit_peak_shape;
use crate::models::{
    PeakRecord,
    PeakShape,
    PickedPeak,
};
use crate::noise::{
    MedianNoiseEstimator,
    SignalToNoiseEstimator,
};
use crate::quality::{
    GateDecision,
    QualityGate,
    RejectionReason,
};
use crate::refine::{
    PeakRefiner,
    PenalizedGradientRefiner,
    RefinementProblem,
};
use crate::scanner::{
    MaximaScanner,
    ScanDirection,
    ScanThresholds,
};
use crate::signal::{
    AcquisitionLevel,
    ProfileSignal,
    WorkingSignal,
};
use crate::transform::WaveletTransform;
use crate::utils::correlation::squared_pearson_with;

/// Summary of the picking of a single signal.
///
/// Returned alongside the peaks by [PeakPickerCwt::pick_with_summary]
/// and [PeakPickerCwt::pick_into].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PickingSummary {
    /// Number of transform passes, including the last empty one.
    pub sweeps: usize,
    /// Transform maxima that passed both height thresholds.
    pub candidates: usize,
    /// Candidates whose region was truncated or too narrow.
    pub irregular: usize,
    /// Candidates where no shape family gave a usable fit.
    pub degenerate: usize,
    pub rejected_correlation: usize,
    pub rejected_fwhm: usize,
    pub rejected_signal_to_noise: usize,
    pub accepted: usize,
    /// Whether the accepted shapes went through the refiner.
    pub refined: bool,
}

impl PickingSummary {
    fn record_rejection(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::Correlation => self.rejected_correlation += 1,
            RejectionReason::Fwhm => self.rejected_fwhm += 1,
            RejectionReason::SignalToNoise => self.rejected_signal_to_noise += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected_correlation + self.rejected_fwhm + self.rejected_signal_to_noise
    }
}

/// Summary of the picking over multiple signals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedPickingSummary {
    pub spectra_processed: usize,
    pub spectra_with_peaks: usize,
    pub total_sweeps: usize,
    pub total_candidates: usize,
    pub total_irregular: usize,
    pub total_degenerate: usize,
    pub total_rejected_correlation: usize,
    pub total_rejected_fwhm: usize,
    pub total_rejected_signal_to_noise: usize,
    pub total_accepted: usize,
    pub refined_spectra: usize,
}

impl AggregatedPickingSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combine(mut self, right: &Self) -> Self {
        self.spectra_processed += right.spectra_processed;
        self.spectra_with_peaks += right.spectra_with_peaks;
        self.total_sweeps += right.total_sweeps;
        self.total_candidates += right.total_candidates;
        self.total_irregular += right.total_irregular;
        self.total_degenerate += right.total_degenerate;
        self.total_rejected_correlation += right.total_rejected_correlation;
        self.total_rejected_fwhm += right.total_rejected_fwhm;
        self.total_rejected_signal_to_noise += right.total_rejected_signal_to_noise;
        self.total_accepted += right.total_accepted;
        self.refined_spectra += right.refined_spectra;
        self
    }

    pub fn fold_summary(mut left: Self, other: &PickingSummary) -> Self {
        left.spectra_processed += 1;
        if other.accepted > 0 {
            left.spectra_with_peaks += 1;
        }
        left.total_sweeps += other.sweeps;
        left.total_candidates += other.candidates;
        left.total_irregular += other.irregular;
        left.total_degenerate += other.degenerate;
        left.total_rejected_correlation += other.rejected_correlation;
        left.total_rejected_fwhm += other.rejected_fwhm;
        left.total_rejected_signal_to_noise += other.rejected_signal_to_noise;
        left.total_accepted += other.accepted;
        if other.refined {
            left.refined_spectra += 1;
        }
        left
    }
}

impl From<PickingSummary> for AggregatedPickingSummary {
    fn from(value: PickingSummary) -> Self {
        Self::fold_summary(Self::new(), &value)
    }
}

impl Display for AggregatedPickingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Spectra processed: {}", self.spectra_processed)?;
        writeln!(f, "Spectra with peaks: {}", self.spectra_with_peaks)?;
        writeln!(f, "Total sweeps: {}", self.total_sweeps)?;
        writeln!(f, "Total candidates: {}", self.total_candidates)?;
        writeln!(f, "Total accepted peaks: {}", self.total_accepted)?;
        if self.spectra_processed > 0 {
            writeln!(
                f,
                "Average peaks per spectrum: {:.2}",
                self.total_accepted as f64 / self.spectra_processed as f64
            )?;
        }
        writeln!(
            f,
            "Discarded: Irregular: {}, Degenerate: {}",
            self.total_irregular, self.total_degenerate
        )?;
        writeln!(
            f,
            "Rejections: Correlation: {}, Fwhm: {}, SignalToNoise: {}",
            self.total_rejected_correlation,
            self.total_rejected_fwhm,
            self.total_rejected_signal_to_noise,
        )?;
        writeln!(f, "Refined spectra: {}", self.refined_spectra)?;
        Ok(())
    }
}

/// Peaks of one spectrum of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedSpectrum<R = PickedPeak> {
    /// Index of the spectrum in the input slice.
    pub index: usize,
    pub level: AcquisitionLevel,
    pub peaks: Vec<R>,
    pub summary: PickingSummary,
}

#[derive(Debug, Clone, Copy)]
struct AcceptedPeak {
    shape: PeakShape,
    left: usize,
    right: usize,
    signal_to_noise: f64,
}

/// Wavelet based peak picker for profile signals.
///
/// Configuration is read-only during picking, a single picker can be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct PeakPickerCwt {
    config: PickerConfig,
    transform: WaveletTransform,
    thresholds: ScanThresholds,
    refiner: Option<Arc<dyn PeakRefiner>>,
}

impl PeakPickerCwt {
    /// Validates the config and precomputes the wavelet and thresholds.
    ///
    /// The picker comes with a [PenalizedGradientRefiner] built from
    /// `config.optimization`, which only runs when optimization is enabled.
    pub fn new(config: PickerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transform = WaveletTransform::new(config.wavelet.scale, config.wavelet.spacing);
        let thresholds = ScanThresholds::new(
            &transform,
            config.thresholds.peak_bound,
            config.thresholds.peak_bound_secondary,
        );
        let refiner: Arc<dyn PeakRefiner> =
            Arc::new(PenalizedGradientRefiner::from(&config.optimization));
        Ok(Self {
            config,
            transform,
            thresholds,
            refiner: Some(refiner),
        })
    }

    /// Replaces the refiner used when optimization is enabled.
    pub fn with_refiner(mut self, refiner: Arc<dyn PeakRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Removes the refiner, refinement becomes a no-op.
    pub fn without_refiner(mut self) -> Self {
        self.refiner = None;
        self
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ScanThresholds {
        &self.thresholds
    }

    /// Applies a modified config, leaving the picker untouched if it is invalid.
    fn update_config(&mut self, config: PickerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.wavelet != self.config.wavelet {
            self.transform = WaveletTransform::new(config.wavelet.scale, config.wavelet.spacing);
        }
        self.thresholds = ScanThresholds::new(
            &self.transform,
            config.thresholds.peak_bound,
            config.thresholds.peak_bound_secondary,
        );
        self.config = config;
        Ok(())
    }

    pub fn set_wavelet_scale(&mut self, scale: f64) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        config.wavelet.scale = scale;
        self.update_config(config)
    }

    pub fn set_peak_bound(&mut self, peak_bound: f64) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        config.thresholds.peak_bound = peak_bound;
        self.update_config(config)
    }

    pub fn set_peak_bound_secondary(&mut self, peak_bound: f64) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        config.thresholds.peak_bound_secondary = peak_bound;
        self.update_config(config)
    }

    /// Turns the joint refinement of accepted shapes on or off.
    pub fn set_optimization(&mut self, enabled: bool) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        config.optimization.enabled = enabled;
        self.update_config(config)
    }

    /// Picks the peaks of a signal, in discovery order.
    pub fn pick<S: ProfileSignal + ?Sized>(
        &self,
        signal: &S,
        level: AcquisitionLevel,
    ) -> Vec<PickedPeak> {
        self.pick_with_summary(signal, level).0
    }

    pub fn pick_with_summary<S: ProfileSignal + ?Sized>(
        &self,
        signal: &S,
        level: AcquisitionLevel,
    ) -> (Vec<PickedPeak>, PickingSummary) {
        let mut out = Vec::new();
        let summary = self.pick_into(signal, level, &mut out);
        (out, summary)
    }

    /// Picks the peaks of a signal and appends them to `out` as any record type.
    ///
    /// ```
    /// use cwtpick::{AcquisitionLevel, CentroidPeak, PeakPickerCwt, PickerConfig};
    ///
    /// let picker = PeakPickerCwt::new(PickerConfig::default()).unwrap();
    /// let mut out: Vec<CentroidPeak> = Vec::new();
    /// let empty: Vec<(f64, f64)> = Vec::new();
    /// let summary = picker.pick_into(&empty, AcquisitionLevel::Primary, &mut out);
    /// assert!(out.is_empty());
    /// assert_eq!(summary.candidates, 0);
    /// ```
    pub fn pick_into<S: ProfileSignal + ?Sized, R: PeakRecord>(
        &self,
        signal: &S,
        level: AcquisitionLevel,
        out: &mut Vec<R>,
    ) -> PickingSummary {
        let (accepted, summary) = self.pick_shapes(signal, level);
        out.extend(
            accepted
                .iter()
                .map(|peak| R::from_shape(&peak.shape, peak.signal_to_noise)),
        );
        summary
    }

    /// Picks a batch of independent signals in parallel.
    ///
    /// Only signals with at least one peak are returned, in input order.
    pub fn pick_experiment<S: ProfileSignal + Sync>(
        &self,
        spectra: &[(S, AcquisitionLevel)],
    ) -> (Vec<PickedSpectrum>, AggregatedPickingSummary) {
        let results: Vec<(Option<PickedSpectrum>, PickingSummary)> = spectra
            .par_iter()
            .enumerate()
            .map(|(index, (signal, level))| {
                let (peaks, summary) = self.pick_with_summary(signal, *level);
                let picked = if peaks.is_empty() {
                    None
                } else {
                    Some(PickedSpectrum {
                        index,
                        level: *level,
                        peaks,
                        summary,
                    })
                };
                (picked, summary)
            })
            .collect();

        let aggregated = results
            .iter()
            .fold(AggregatedPickingSummary::new(), |acc, (_, summary)| {
                AggregatedPickingSummary::fold_summary(acc, summary)
            });
        let picked = results
            .into_iter()
            .filter_map(|(picked, _)| picked)
            .collect();
        (picked, aggregated)
    }

    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    fn pick_shapes<S: ProfileSignal + ?Sized>(
        &self,
        signal: &S,
        level: AcquisitionLevel,
    ) -> (Vec<AcceptedPeak>, PickingSummary) {
        let mut summary = PickingSummary::default();
        let mut accepted: Vec<AcceptedPeak> = Vec::new();
        if signal.is_empty() {
            return (accepted, summary);
        }

        let original = WorkingSignal::from_signal(signal);
        let mut working = original.clone();
        let noise = MedianNoiseEstimator::new(&original, self.config.noise);
        let gate = QualityGate::from(&self.config.thresholds);
        let level_thresholds = self.thresholds.for_level(level);
        let search_radius = self.config.thresholds.search_radius;
        let noise_level = self.config.thresholds.noise_level;

        let mut transform = Vec::with_capacity(working.len());
        loop {
            summary.sweeps += 1;
            self.transform
                .transform_into(working.positions(), working.intensities(), &mut transform);

            let mut accepted_in_sweep = 0;
            let mut cursor = 0;
            loop {
                let hit = MaximaScanner::new(
                    &transform,
                    working.intensities(),
                    level_thresholds,
                    search_radius,
                )
                .next_maximum(cursor, ScanDirection::Forward);
                let Some(hit) = hit else {
                    break;
                };
                summary.candidates += 1;
                trace!(
                    "Candidate at {:.5} (transform index {})",
                    working.positions()[hit.max_index],
                    hit.transform_index
                );

                let region =
                    resolve_endpoints(working.intensities(), &transform, hit.max_index, noise_level);
                if region.is_regular() {
                    let centroid =
                        centroid_position(working.positions(), working.intensities(), &region);
                    match fit_peak_shape(working.positions(), working.intensities(), &region, centroid)
                    {
                        Some(shape) => {
                            let signal_to_noise = noise.signal_to_noise(region.max);
                            match gate.evaluate(&shape, signal_to_noise) {
                                GateDecision::Accepted => {
                                    accepted.push(AcceptedPeak {
                                        shape,
                                        left: region.left,
                                        right: region.right,
                                        signal_to_noise,
                                    });
                                    accepted_in_sweep += 1;
                                }
                                GateDecision::Rejected(reason) => summary.record_rejection(reason),
                            }
                        }
                        None => summary.degenerate += 1,
                    }
                } else {
                    summary.irregular += 1;
                }

                working.zero_region(region.left, region.right);
                cursor = region.right.max(hit.transform_index) + 1;
            }

            if accepted_in_sweep == 0 {
                break;
            }
        }
        summary.accepted = accepted.len();

        if self.config.optimization.enabled && !accepted.is_empty() {
            if let Some(refiner) = &self.refiner {
                self.refine(refiner.as_ref(), &original, &mut accepted);
                summary.refined = true;
            }
        }

        debug!(
            "Picked {} peaks over {} sweeps ({} candidates, {} rejected, {} irregular, {} degenerate)",
            summary.accepted,
            summary.sweeps,
            summary.candidates,
            summary.rejected(),
            summary.irregular,
            summary.degenerate
        );
        (accepted, summary)
    }

    /// Runs the refiner and rescores every shape against its original region.
    /// Shapes the refiner left unusable keep their depletion fit.
    fn refine(
        &self,
        refiner: &dyn PeakRefiner,
        original: &WorkingSignal,
        accepted: &mut [AcceptedPeak],
    ) {
        let mut shapes: Vec<PeakShape> = accepted.iter().map(|peak| peak.shape).collect();
        let regions: Vec<(usize, usize)> =
            accepted.iter().map(|peak| (peak.left, peak.right)).collect();
        let problem = RefinementProblem {
            positions: original.positions(),
            intensities: original.intensities(),
            regions: &regions,
        };
        refiner.refine(&mut shapes, &problem);

        let positions = original.positions();
        let intensities = original.intensities();
        for (peak, refined) in accepted.iter_mut().zip(shapes) {
            if !refined.is_valid() {
                continue;
            }
            let mut shape = refined;
            shape.correlation = squared_pearson_with(
                &positions[peak.left..=peak.right],
                &intensities[peak.left..=peak.right],
                |x| refined.evaluate(x),
            );
            peak.shape = shape;
        }
    }
}
