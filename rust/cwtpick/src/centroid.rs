use crate::endpoints::PeakRegion;

/// Fraction of the region maximum a sample must exceed to contribute
/// to the centroid.
pub const CENTROID_RELATIVE_THRESHOLD: f64 = 0.6;

/// Intensity weighted mean position of the samples in the region that are
/// above 60% of the region maximum.
///
/// Falls back to the position of the region maximum when nothing carries
/// weight (e.g. an all zero region).
///
/// ```
/// use cwtpick::centroid::centroid_position;
/// use cwtpick::endpoints::{BoundaryKind, PeakRegion};
///
/// let positions = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let intensities = [10.0, 80.0, 100.0, 80.0, 10.0];
/// let region = PeakRegion { left: 0, max: 2, right: 4, kind: BoundaryKind::Regular };
/// assert_eq!(centroid_position(&positions, &intensities, &region), 3.0);
/// ```
pub fn centroid_position(positions: &[f64], intensities: &[f64], region: &PeakRegion) -> f64 {
    let fallback = positions[region.max];
    let right = region.right.min(positions.len().min(intensities.len()) - 1);
    if region.left > right {
        return fallback;
    }

    let ints = &intensities[region.left..=right];
    let pos = &positions[region.left..=right];
    let region_max = ints.iter().cloned().fold(0.0, f64::max);
    let cutoff = CENTROID_RELATIVE_THRESHOLD * region_max;

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (&p, &i) in pos.iter().zip(ints.iter()) {
        if i > cutoff {
            weighted += p * i;
            total += i;
        }
    }

    if total > 0.0 {
        weighted / total
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::BoundaryKind;

    fn region(left: usize, max: usize, right: usize) -> PeakRegion {
        PeakRegion {
            left,
            max,
            right,
            kind: BoundaryKind::Regular,
        }
    }

    #[test]
    fn test_low_samples_are_excluded() {
        let positions = [1.0, 2.0, 3.0, 4.0];
        // Only the two last samples are above 60% of 100
        let intensities = [50.0, 55.0, 100.0, 100.0];
        let c = centroid_position(&positions, &intensities, &region(0, 2, 3));
        assert!((c - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_region_falls_back_to_max() {
        let positions = [1.0, 2.0, 3.0];
        let intensities = [0.0, 0.0, 0.0];
        assert_eq!(
            centroid_position(&positions, &intensities, &region(0, 1, 2)),
            2.0
        );
    }

    #[test]
    fn test_skewed_peak_moves_towards_heavy_side() {
        let positions = [1.0, 2.0, 3.0, 4.0, 5.0];
        let intensities = [10.0, 70.0, 100.0, 90.0, 65.0];
        let c = centroid_position(&positions, &intensities, &region(0, 2, 4));
        assert!(c > 3.0);
        assert!(c < 4.0);
    }
}
