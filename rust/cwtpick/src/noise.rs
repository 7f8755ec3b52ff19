use crate::config::NoiseConfig;
use crate::signal::ProfileSignal;

/// Local signal to noise estimation, queried once per candidate peak.
pub trait SignalToNoiseEstimator {
    /// Signal to noise ratio of the sample at `index`.
    fn signal_to_noise(&self, index: usize) -> f64;
}

/// Median based local noise estimator.
///
/// The noise of a sample is the median of the positive intensities inside
/// a window of `window_length` position units centered on it. Zero
/// intensities are ignored since profile data is commonly zero-filled
/// between peaks, which would otherwise drive the median to zero.
///
/// The estimator keeps its own snapshot of the signal, so later
/// zeroing of the working signal does not change its answers.
///
/// ```
/// use cwtpick::config::NoiseConfig;
/// use cwtpick::noise::{MedianNoiseEstimator, SignalToNoiseEstimator};
///
/// let signal: Vec<(f64, f64)> = (0..100)
///     .map(|i| (i as f64, if i == 50 { 40.0 } else { 2.0 }))
///     .collect();
/// let config = NoiseConfig {
///     window_length: 50.0,
///     ..Default::default()
/// };
/// let sne = MedianNoiseEstimator::new(&signal, config);
/// assert_eq!(sne.signal_to_noise(50), 20.0);
/// ```
#[derive(Debug, Clone)]
pub struct MedianNoiseEstimator {
    positions: Vec<f64>,
    intensities: Vec<f64>,
    config: NoiseConfig,
}

impl MedianNoiseEstimator {
    pub fn new<S: ProfileSignal + ?Sized>(signal: &S, config: NoiseConfig) -> Self {
        let n = signal.len();
        let positions = (0..n).map(|i| signal.position(i)).collect();
        let intensities = (0..n).map(|i| signal.intensity(i)).collect();
        Self {
            positions,
            intensities,
            config,
        }
    }

    /// Noise level around the sample at `index`.
    pub fn noise_at(&self, index: usize) -> f64 {
        let fallback = self.config.noise_for_empty_window;
        let Some(&center) = self.positions.get(index) else {
            return fallback;
        };
        let half = 0.5 * self.config.window_length;
        let lo = self.positions.partition_point(|&x| x < center - half);
        let hi = self.positions.partition_point(|&x| x <= center + half);
        if hi <= lo {
            return fallback;
        }

        let mut window: Vec<f64> = self.intensities[lo..hi]
            .iter()
            .copied()
            .filter(|x| *x > 0.0)
            .collect();
        if window.is_empty() || window.len() < self.config.min_required_elements {
            return fallback;
        }
        let mid = window.len() / 2;
        let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        if *median > 0.0 { *median } else { fallback }
    }
}

impl SignalToNoiseEstimator for MedianNoiseEstimator {
    fn signal_to_noise(&self, index: usize) -> f64 {
        let Some(&intensity) = self.intensities.get(index) else {
            return 0.0;
        };
        intensity / self.noise_at(index)
    }
}
