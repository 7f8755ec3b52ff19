//! Continuous wavelet transform of a profile signal.
//!
//! The transform at every sample is the numeric (trapezoidal) integral of
//! the signal against a Marr ("mexican hat") wavelet centered on that sample.
//! Integrating over the real positions (instead of convolving sample indices)
//! keeps the transform comparable between signals with different or
//! irregular sampling densities.
//!
//! ```
//! use cwtpick::transform::WaveletTransform;
//!
//! let wt = WaveletTransform::new(0.05, 0.001);
//! let positions: Vec<f64> = (0..601).map(|i| 99.7 + i as f64 * 0.001).collect();
//! let intensities: Vec<f64> = positions
//!     .iter()
//!     .map(|x| 100.0 / (1.0 + ((x - 100.0) / 0.025).powi(2)))
//!     .collect();
//! let out = wt.transform(&positions, &intensities);
//! assert_eq!(out.len(), positions.len());
//! let max_idx = out
//!     .iter()
//!     .enumerate()
//!     .max_by(|a, b| a.1.total_cmp(b.1))
//!     .unwrap()
//!     .0;
//! assert_eq!(max_idx, 300);
//! ```

/// Kernel support on each side, in multiples of the scale.
/// The Marr wavelet is < 1e-3 of its peak beyond 4 scales.
const SUPPORT_IN_SCALES: f64 = 4.0;

/// Largest wavelet table a config may ask for.
pub const MAX_TABLE_POINTS: f64 = 1e6;

fn marr(x: f64) -> f64 {
    let x2 = x * x;
    (1.0 - x2) * (-0.5 * x2).exp()
}

/// Tabulated Marr wavelet at a given scale.
#[derive(Debug, Clone)]
pub struct WaveletTransform {
    scale: f64,
    spacing: f64,
    /// Right half of the wavelet, `wavelet[i]` is the value at `i * spacing`.
    wavelet: Vec<f64>,
}

impl WaveletTransform {
    /// Both `scale` and `spacing` have to be > 0, callers validate
    /// this through [crate::PickerConfig::validate].
    pub fn new(scale: f64, spacing: f64) -> Self {
        let n_right = Self::table_points(scale, spacing).ceil() as usize + 1;
        let norm = 1.0 / scale.sqrt();
        let wavelet = (0..n_right)
            .map(|i| marr(i as f64 * spacing / scale) * norm)
            .collect();
        Self {
            scale,
            spacing,
            wavelet,
        }
    }

    /// Number of tabulated values (minus one) for a scale and spacing.
    pub fn table_points(scale: f64, spacing: f64) -> f64 {
        SUPPORT_IN_SCALES * scale / spacing
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Half width of the kernel support, in position units.
    pub fn support(&self) -> f64 {
        SUPPORT_IN_SCALES * self.scale
    }

    /// Linear interpolation in the tabulated wavelet, 0.0 outside the support.
    fn wavelet_at(&self, distance: f64) -> f64 {
        let d = distance.abs() / self.spacing;
        let idx = d.floor() as usize;
        let len = self.wavelet.len();
        if idx + 1 < len {
            let frac = d - idx as f64;
            self.wavelet[idx] * (1.0 - frac) + self.wavelet[idx + 1] * frac
        } else if idx + 1 == len {
            self.wavelet[idx]
        } else {
            0.0
        }
    }

    /// Integral over samples `lo..hi` of the signal against the wavelet
    /// centered at `center`.
    fn integrate(
        &self,
        positions: &[f64],
        intensities: &[f64],
        lo: usize,
        hi: usize,
        center: f64,
    ) -> f64 {
        if hi <= lo + 1 {
            return 0.0;
        }
        let value_at = |j: usize| {
            let int = intensities[j];
            if int == 0.0 {
                0.0
            } else {
                int * self.wavelet_at(positions[j] - center)
            }
        };

        let mut acc = 0.0;
        let mut prev_x = positions[lo];
        let mut prev_v = value_at(lo);
        for j in (lo + 1)..hi {
            let x = positions[j];
            let v = value_at(j);
            acc += 0.5 * (prev_v + v) * (x - prev_x);
            prev_x = x;
            prev_v = v;
        }
        acc
    }

    /// Computes the transform of the signal, writing one value per sample into `out`.
    ///
    /// Near the array edges the kernel is truncated to the available samples.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn transform_into(&self, positions: &[f64], intensities: &[f64], out: &mut Vec<f64>) {
        let n = positions.len().min(intensities.len());
        out.clear();
        out.resize(n, 0.0);

        let support = self.support();
        let mut lo = 0;
        let mut hi = 0;
        for (i, slot) in out.iter_mut().enumerate() {
            let center = positions[i];
            while lo < i && positions[lo] < center - support {
                lo += 1;
            }
            hi = hi.max(i + 1);
            while hi < n && positions[hi] <= center + support {
                hi += 1;
            }
            *slot = self.integrate(positions, intensities, lo, hi, center);
        }
    }

    pub fn transform(&self, positions: &[f64], intensities: &[f64]) -> Vec<f64> {
        let mut out = Vec::new();
        self.transform_into(positions, intensities, &mut out);
        out
    }

    /// Transform value at the apex of a lorentzian peak of the given height
    /// whose FWHM equals the wavelet scale.
    ///
    /// This maps a raw height threshold into the transform domain, the
    /// reference peak is sampled at the wavelet spacing.
    pub fn reference_peak_response(&self, height: f64) -> f64 {
        let half_width = 0.5 * self.scale;
        let n_side = self.wavelet.len() - 1;
        let positions: Vec<f64> = (0..=(2 * n_side))
            .map(|i| (i as f64 - n_side as f64) * self.spacing)
            .collect();
        let intensities: Vec<f64> = positions
            .iter()
            .map(|x| height / (1.0 + (x / half_width).powi(2)))
            .collect();
        self.integrate(&positions, &intensities, 0, positions.len(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lorentz_signal(center: f64, height: f64, fwhm: f64, n: usize, step: f64) -> (Vec<f64>, Vec<f64>) {
        let start = center - (n / 2) as f64 * step;
        let positions: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
        let hw = fwhm / 2.0;
        let intensities = positions
            .iter()
            .map(|x| height / (1.0 + ((x - center) / hw).powi(2)))
            .collect();
        (positions, intensities)
    }

    #[test]
    fn test_wavelet_shape() {
        let wt = WaveletTransform::new(0.1, 0.001);
        let norm = 1.0 / 0.1f64.sqrt();
        assert!((wt.wavelet_at(0.0) - norm).abs() < 1e-12);
        // Zero crossing of the marr wavelet at one scale
        assert!(wt.wavelet_at(0.1).abs() < 1e-9);
        assert!(wt.wavelet_at(-0.15) < 0.0);
        assert_eq!(wt.wavelet_at(0.41), 0.0);
    }

    #[test]
    fn test_transform_length_and_zero_signal() {
        let wt = WaveletTransform::new(0.05, 0.001);
        let positions: Vec<f64> = (0..50).map(|i| i as f64 * 0.001).collect();
        let intensities = vec![0.0; 50];
        let out = wt.transform(&positions, &intensities);
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_short_signal_does_not_panic() {
        let wt = WaveletTransform::new(0.5, 0.001);
        let out = wt.transform(&[1.0, 1.001], &[5.0, 6.0]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|x| x.is_finite()));
        assert!(wt.transform(&[], &[]).is_empty());
        assert_eq!(wt.transform(&[1.0], &[3.0]), vec![0.0]);
    }

    #[test]
    fn test_transform_is_linear_in_height() {
        let wt = WaveletTransform::new(0.05, 0.001);
        let (pos, int_a) = lorentz_signal(100.0, 10.0, 0.05, 301, 0.001);
        let int_b: Vec<f64> = int_a.iter().map(|x| x * 3.0).collect();
        let a = wt.transform(&pos, &int_a);
        let b = wt.transform(&pos, &int_b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((3.0 * x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reference_response_matches_sampled_peak() {
        let wt = WaveletTransform::new(0.05, 0.001);
        let (pos, int) = lorentz_signal(100.0, 50.0, 0.05, 601, 0.001);
        let out = wt.transform(&pos, &int);
        let apex = out.iter().cloned().fold(f64::MIN, f64::max);
        let reference = wt.reference_peak_response(50.0);
        assert!(reference > 0.0);
        assert!(
            (apex - reference).abs() / reference < 0.02,
            "apex {} vs reference {}",
            apex,
            reference
        );
    }
}
