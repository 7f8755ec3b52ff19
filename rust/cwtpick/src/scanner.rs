//! Detection of candidate peaks in the transform domain.
//!
//! A candidate is a local maximum of the wavelet transform above the
//! transform threshold of the acquisition level, whose raw maximum
//! (searched within a few samples of the transform maximum) is at least
//! as high as the raw height threshold of that level.

use tracing::trace;

use crate::signal::AcquisitionLevel;
use crate::transform::WaveletTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// Height thresholds of one acquisition level, in both domains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelThresholds {
    /// Minimum raw intensity of the peak maximum.
    pub height: f64,
    /// Minimum transform value of the transform maximum.
    pub transform: f64,
}

/// Thresholds of both acquisition levels.
///
/// The transform threshold is the transform response of a reference
/// lorentzian (FWHM equal to the wavelet scale) as high as the raw
/// threshold. Has to be rebuilt whenever the scale or the bounds change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanThresholds {
    pub primary: LevelThresholds,
    pub secondary: LevelThresholds,
}

impl ScanThresholds {
    pub fn new(transform: &WaveletTransform, peak_bound: f64, peak_bound_secondary: f64) -> Self {
        // The transform is linear, a unit response scales to any height.
        let unit = transform.reference_peak_response(1.0);
        Self {
            primary: LevelThresholds {
                height: peak_bound,
                transform: unit * peak_bound,
            },
            secondary: LevelThresholds {
                height: peak_bound_secondary,
                transform: unit * peak_bound_secondary,
            },
        }
    }

    pub fn for_level(&self, level: AcquisitionLevel) -> LevelThresholds {
        match level {
            AcquisitionLevel::Primary => self.primary,
            AcquisitionLevel::Secondary => self.secondary,
        }
    }
}

/// Position of a candidate, in the transform and in the raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanHit {
    pub transform_index: usize,
    pub max_index: usize,
}

/// Walks a transform buffer looking for candidate maxima.
///
/// ```
/// use cwtpick::scanner::{LevelThresholds, MaximaScanner, ScanDirection};
///
/// let transform = [0.0, 1.0, 5.0, 2.0, 0.0, 3.0, 9.0, 3.0, 0.0];
/// let raw = [0.0, 2.0, 4.0, 8.0, 0.0, 1.0, 2.0, 30.0, 1.0];
/// let thresholds = LevelThresholds { height: 5.0, transform: 4.0 };
/// let scanner = MaximaScanner::new(&transform, &raw, thresholds, 1);
///
/// let hit = scanner.next_maximum(0, ScanDirection::Forward).unwrap();
/// assert_eq!((hit.transform_index, hit.max_index), (2, 3));
/// let hit = scanner.next_maximum(4, ScanDirection::Forward).unwrap();
/// assert_eq!((hit.transform_index, hit.max_index), (6, 7));
/// assert!(scanner.next_maximum(7, ScanDirection::Forward).is_none());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MaximaScanner<'a> {
    transform: &'a [f64],
    intensities: &'a [f64],
    thresholds: LevelThresholds,
    search_radius: usize,
}

impl<'a> MaximaScanner<'a> {
    pub fn new(
        transform: &'a [f64],
        intensities: &'a [f64],
        thresholds: LevelThresholds,
        search_radius: usize,
    ) -> Self {
        Self {
            transform,
            intensities,
            thresholds,
            search_radius,
        }
    }

    fn len(&self) -> usize {
        self.transform.len().min(self.intensities.len())
    }

    /// Index of the highest raw sample within the search radius of `center`,
    /// the first one wins on ties.
    fn raw_maximum(&self, center: usize) -> usize {
        let lo = center.saturating_sub(self.search_radius);
        let hi = center.saturating_add(self.search_radius).min(self.len() - 1);
        let mut best = lo;
        for i in (lo + 1)..=hi {
            if self.intensities[i] > self.intensities[best] {
                best = i;
            }
        }
        best
    }

    fn is_forward_maximum(&self, i: usize) -> bool {
        let wt = self.transform;
        wt[i - 1] < wt[i] && wt[i] >= wt[i + 1]
    }

    fn is_backward_maximum(&self, i: usize) -> bool {
        let wt = self.transform;
        wt[i + 1] < wt[i] && wt[i] >= wt[i - 1]
    }

    fn accept(&self, i: usize) -> Option<ScanHit> {
        if self.transform[i] <= self.thresholds.transform {
            return None;
        }
        let max_index = self.raw_maximum(i);
        let height = self.intensities[max_index];
        if height <= 0.0 || height < self.thresholds.height {
            trace!(
                "Transform maximum at {} has raw height {} below {}",
                i, height, self.thresholds.height
            );
            return None;
        }
        Some(ScanHit {
            transform_index: i,
            max_index,
        })
    }

    /// Next candidate starting at `start` (inclusive) in the given direction.
    ///
    /// Returns `None` once fewer than 3 samples remain to be scanned, which
    /// is the regular end of a sweep.
    pub fn next_maximum(&self, start: usize, direction: ScanDirection) -> Option<ScanHit> {
        let n = self.len();
        match direction {
            ScanDirection::Forward => {
                if start >= n || n - start < 3 {
                    return None;
                }
                (start.max(1)..(n - 1))
                    .filter(|&i| self.is_forward_maximum(i))
                    .find_map(|i| self.accept(i))
            }
            ScanDirection::Backward => {
                if n < 3 || start < 2 {
                    return None;
                }
                let start = start.min(n - 2);
                (1..=start)
                    .rev()
                    .filter(|&i| self.is_backward_maximum(i))
                    .find_map(|i| self.accept(i))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOSE: LevelThresholds = LevelThresholds {
        height: 0.0,
        transform: 0.0,
    };

    #[test]
    fn test_short_buffers_are_not_found() {
        let scanner = MaximaScanner::new(&[0.0, 1.0], &[0.0, 1.0], LOOSE, 3);
        assert!(scanner.next_maximum(0, ScanDirection::Forward).is_none());
        assert!(scanner.next_maximum(1, ScanDirection::Backward).is_none());

        let scanner = MaximaScanner::new(&[], &[], LOOSE, 3);
        assert!(scanner.next_maximum(0, ScanDirection::Forward).is_none());
    }

    #[test]
    fn test_remaining_samples() {
        let wt = [0.0, 0.0, 0.0, 1.0, 5.0, 1.0];
        let raw = [0.0, 0.0, 0.0, 1.0, 5.0, 1.0];
        let scanner = MaximaScanner::new(&wt, &raw, LOOSE, 1);
        assert_eq!(
            scanner.next_maximum(3, ScanDirection::Forward).map(|x| x.max_index),
            Some(4)
        );
        assert!(scanner.next_maximum(4, ScanDirection::Forward).is_none());
    }

    #[test]
    fn test_transform_threshold() {
        let wt = [0.0, 3.0, 0.0, 6.0, 0.0];
        let raw = [0.0, 10.0, 0.0, 10.0, 0.0];
        let thresholds = LevelThresholds {
            height: 1.0,
            transform: 3.0,
        };
        let scanner = MaximaScanner::new(&wt, &raw, thresholds, 0);
        let hit = scanner.next_maximum(0, ScanDirection::Forward).unwrap();
        assert_eq!(hit.transform_index, 3);
    }

    #[test]
    fn test_raw_height_threshold_skips_candidate() {
        let wt = [0.0, 9.0, 0.0, 6.0, 0.0];
        let raw = [0.0, 2.0, 0.0, 10.0, 0.0];
        let thresholds = LevelThresholds {
            height: 5.0,
            transform: 1.0,
        };
        let scanner = MaximaScanner::new(&wt, &raw, thresholds, 0);
        let hit = scanner.next_maximum(0, ScanDirection::Forward).unwrap();
        assert_eq!(hit.max_index, 3);
    }

    #[test]
    fn test_search_radius_is_clamped() {
        let wt = [0.0, 5.0, 1.0, 0.0];
        let raw = [7.0, 1.0, 1.0, 9.0];
        let scanner = MaximaScanner::new(&wt, &raw, LOOSE, 10);
        let hit = scanner.next_maximum(0, ScanDirection::Forward).unwrap();
        assert_eq!(hit.transform_index, 1);
        assert_eq!(hit.max_index, 3);
    }

    #[test]
    fn test_unbounded_search_radius() {
        let wt = [0.0, 1.0, 5.0, 1.0, 0.0];
        let raw = [0.0, 2.0, 4.0, 8.0, 0.0];
        let scanner = MaximaScanner::new(&wt, &raw, LOOSE, usize::MAX);
        let hit = scanner.next_maximum(0, ScanDirection::Forward).unwrap();
        assert_eq!(hit.transform_index, 2);
        assert_eq!(hit.max_index, 3);
        let hit = scanner.next_maximum(4, ScanDirection::Backward).unwrap();
        assert_eq!(hit.max_index, 3);
    }

    #[test]
    fn test_backward_scan() {
        let wt = [0.0, 4.0, 0.0, 0.0, 8.0, 0.0];
        let raw = wt;
        let scanner = MaximaScanner::new(&wt, &raw, LOOSE, 0);
        let hit = scanner.next_maximum(5, ScanDirection::Backward).unwrap();
        assert_eq!(hit.transform_index, 4);
        let hit = scanner.next_maximum(3, ScanDirection::Backward).unwrap();
        assert_eq!(hit.transform_index, 1);
        assert!(scanner.next_maximum(0, ScanDirection::Backward).is_none());
    }

    #[test]
    fn test_thresholds_scale_with_bounds() {
        let wt = WaveletTransform::new(0.05, 0.001);
        let th = ScanThresholds::new(&wt, 200.0, 50.0);
        assert!(th.primary.transform > 0.0);
        assert!((th.primary.transform - 4.0 * th.secondary.transform).abs() < 1e-9);
        assert_eq!(th.for_level(AcquisitionLevel::Secondary).height, 50.0);
    }
}
