//! Boundaries of a candidate peak in the raw signal, found by walking
//! outward from its maximum until the noise floor or a neighbouring peak.

use tracing::debug;

/// Samples on each side of an ascending sample where the transform is
/// checked for monotonicity.
const MONOTONICITY_RADIUS: usize = 2;

/// How the boundaries of a region were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Both sides reached the floor or a neighbouring peak.
    Regular,
    /// A side ran into the end of the signal while still above the floor.
    Truncated,
    /// The region spans fewer than 3 samples.
    TooNarrow,
}

/// Raw signal region of a candidate peak, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakRegion {
    pub left: usize,
    pub max: usize,
    pub right: usize,
    pub kind: BoundaryKind,
}

impl PeakRegion {
    pub fn is_regular(&self) -> bool {
        self.kind == BoundaryKind::Regular
    }

    pub fn num_samples(&self) -> usize {
        self.right - self.left + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Whether the transform keeps rising towards the peak around `idx`.
///
/// An ascending raw sample on the flank of a transform peak is noise,
/// one on a transform valley is the start of the next peak.
fn transform_is_monotonic(transform: &[f64], idx: usize, side: Side) -> bool {
    if transform.len() < 2 {
        return true;
    }
    let lo = idx.saturating_sub(MONOTONICITY_RADIUS);
    let hi = (idx + MONOTONICITY_RADIUS).min(transform.len() - 1);
    let window = &transform[lo..=hi];
    match side {
        Side::Left => window.windows(2).all(|w| w[0] <= w[1]),
        Side::Right => window.windows(2).all(|w| w[0] >= w[1]),
    }
}

/// Walks away from `max` until the floor, a neighbouring peak or the signal
/// end. Returns the last index in the peak and whether the end was hit.
fn walk(
    intensities: &[f64],
    transform: &[f64],
    max: usize,
    noise_level: f64,
    side: Side,
) -> (usize, bool) {
    let n = intensities.len();
    let mut current = max;
    loop {
        let next = match side {
            Side::Left if current == 0 => return (current, true),
            Side::Right if current + 1 >= n => return (current, true),
            Side::Left => current - 1,
            Side::Right => current + 1,
        };
        let value = intensities[next];
        if value <= noise_level {
            return (current, false);
        }
        if value <= intensities[current] || transform_is_monotonic(transform, next, side) {
            current = next;
            continue;
        }
        return (current, false);
    }
}

/// Finds the boundaries of the peak whose raw maximum is at `max`.
///
/// ```
/// use cwtpick::endpoints::{resolve_endpoints, BoundaryKind};
///
/// let raw = [0.0, 2.0, 20.0, 50.0, 30.0, 15.0, 3.0, 0.0];
/// let transform = [0.0, 1.0, 8.0, 12.0, 9.0, 4.0, 1.0, 0.0];
/// let region = resolve_endpoints(&raw, &transform, 3, 10.0);
/// assert_eq!((region.left, region.right), (2, 5));
/// assert_eq!(region.kind, BoundaryKind::Regular);
/// ```
pub fn resolve_endpoints(
    intensities: &[f64],
    transform: &[f64],
    max: usize,
    noise_level: f64,
) -> PeakRegion {
    let (left, left_truncated) = walk(intensities, transform, max, noise_level, Side::Left);
    let (right, right_truncated) = walk(intensities, transform, max, noise_level, Side::Right);

    let kind = if left_truncated || right_truncated {
        BoundaryKind::Truncated
    } else if right - left + 1 < 3 {
        BoundaryKind::TooNarrow
    } else {
        BoundaryKind::Regular
    };
    if kind != BoundaryKind::Regular {
        debug!(
            "Irregular peak region [{}, {}] around {}: {:?}",
            left, right, max, kind
        );
    }

    PeakRegion {
        left,
        max,
        right,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_bump_on_flank_is_crossed() {
        // Small bump at index 2, the transform keeps rising through it
        let raw = [0.0, 20.0, 25.0, 22.0, 60.0, 100.0, 40.0, 0.0];
        let transform = [0.0, 1.0, 2.0, 3.0, 6.0, 10.0, 5.0, 0.0];
        let region = resolve_endpoints(&raw, &transform, 5, 10.0);
        assert_eq!(region.left, 1);
        assert_eq!(region.right, 6);
        assert!(region.is_regular());
    }

    #[test]
    fn test_neighbouring_peak_stops_walk() {
        let raw = [0.0, 80.0, 30.0, 20.0, 60.0, 100.0, 40.0, 0.0];
        let transform = [0.0, 8.0, 3.0, 1.0, 6.0, 10.0, 5.0, 0.0];
        let region = resolve_endpoints(&raw, &transform, 5, 10.0);
        assert_eq!(region.left, 3);
        assert_eq!(region.right, 6);
        assert!(region.is_regular());
    }

    #[test]
    fn test_plateau_is_walked() {
        let raw = [0.0, 50.0, 50.0, 50.0, 50.0, 0.0];
        let transform = [0.0, 4.0, 6.0, 6.0, 4.0, 0.0];
        let region = resolve_endpoints(&raw, &transform, 1, 10.0);
        assert_eq!((region.left, region.right), (1, 4));
        assert_eq!(region.num_samples(), 4);
    }

    #[test]
    fn test_truncated_by_signal_end() {
        let raw = [90.0, 100.0, 50.0, 0.0];
        let transform = [9.0, 10.0, 5.0, 0.0];
        let region = resolve_endpoints(&raw, &transform, 1, 10.0);
        assert_eq!(region.left, 0);
        assert_eq!(region.kind, BoundaryKind::Truncated);
        assert!(!region.is_regular());
    }

    #[test]
    fn test_too_narrow() {
        let raw = [0.0, 5.0, 100.0, 5.0, 0.0];
        let transform = [0.0, 1.0, 10.0, 1.0, 0.0];
        let region = resolve_endpoints(&raw, &transform, 2, 10.0);
        assert_eq!((region.left, region.right), (2, 2));
        assert_eq!(region.kind, BoundaryKind::TooNarrow);
    }
}
