//! Area based fit of asymmetric peak shapes.
//!
//! With the height fixed at the region maximum, each flank of a shape is
//! fully determined by the area under that flank and the intensity at the
//! flank endpoint. For a flank of area `A`, height `h` and endpoint
//! intensity `e`:
//!
//! - lorentzian: `l = h / A * atan(sqrt(h / e - 1))`
//! - sech2: `l = h / A * sqrt(1 - e / h)`
//!
//! Both families are fitted and the one that correlates better with the
//! raw samples is kept.

use tracing::trace;

use crate::endpoints::PeakRegion;
use crate::models::{
    PeakShape,
    PeakShapeKind,
};
use crate::utils::correlation::squared_pearson_with;
use crate::utils::integration::trapezoid;

/// Raw measurements of one side of a peak.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Flank {
    area: f64,
    endpoint_intensity: f64,
}

impl Flank {
    fn width(&self, height: f64, kind: PeakShapeKind) -> f64 {
        let ratio = height / self.area;
        match kind {
            PeakShapeKind::Lorentzian => {
                // An endpoint at 0 gives atan(inf) = pi / 2, the full flank
                ratio * (height / self.endpoint_intensity - 1.0).sqrt().atan()
            }
            PeakShapeKind::Sech2 => ratio * (1.0 - self.endpoint_intensity / height).sqrt(),
        }
    }
}

/// Fits both shape families to a region and returns the best one.
///
/// `None` means neither family produced finite positive widths,
/// for instance on a flat top region.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn fit_peak_shape(
    positions: &[f64],
    intensities: &[f64],
    region: &PeakRegion,
    centroid: f64,
) -> Option<PeakShape> {
    let PeakRegion {
        left, max, right, ..
    } = *region;
    if left > max || max > right || right >= positions.len().min(intensities.len()) {
        return None;
    }

    let height = intensities[max];
    if height.is_nan() || height <= 0.0 {
        return None;
    }

    let left_flank = Flank {
        area: trapezoid(&positions[left..=max], &intensities[left..=max]),
        endpoint_intensity: intensities[left],
    };
    let right_flank = Flank {
        area: trapezoid(&positions[max..=right], &intensities[max..=right]),
        endpoint_intensity: intensities[right],
    };
    let area = left_flank.area + right_flank.area;

    let region_positions = &positions[left..=right];
    let region_intensities = &intensities[left..=right];

    let candidate = |kind: PeakShapeKind| {
        let mut shape = PeakShape {
            height,
            position: centroid,
            left_width: left_flank.width(height, kind),
            right_width: right_flank.width(height, kind),
            kind,
            correlation: 0.0,
            area,
        };
        if !shape.is_valid() {
            trace!("Degenerate {:?} fit at {}", kind, centroid);
            return None;
        }
        shape.correlation =
            squared_pearson_with(region_positions, region_intensities, |x| shape.evaluate(x));
        Some(shape)
    };

    let lorentz = candidate(PeakShapeKind::Lorentzian);
    let sech2 = candidate(PeakShapeKind::Sech2);
    match (lorentz, sech2) {
        (Some(l), Some(s)) => {
            if s.correlation > l.correlation {
                Some(s)
            } else {
                Some(l)
            }
        }
        (l, s) => l.or(s),
    }
}
