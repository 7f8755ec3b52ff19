use serde::Serialize;

/// `acosh(sqrt(2))`, the half width at half maximum of `sech^2(x)`.
const SECH2_HALF_WIDTH: f64 = 0.881_373_587_019_543;

/// Family of the analytical function describing a peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeakShapeKind {
    /// `h / (1 + (l * (x - p))^2)`
    Lorentzian,
    /// `h / cosh(l * (x - p))^2`
    Sech2,
}

/// Asymmetric analytical peak.
///
/// `left_width` and `right_width` are the width parameters (inverse
/// position units) used on either side of `position`, larger values
/// mean narrower flanks.
///
/// ```
/// use cwtpick::models::{PeakShape, PeakShapeKind};
///
/// let shape = PeakShape {
///     height: 100.0,
///     position: 500.0,
///     left_width: 40.0,
///     right_width: 40.0,
///     kind: PeakShapeKind::Lorentzian,
///     correlation: 1.0,
///     area: 0.0,
/// };
/// assert!((shape.fwhm() - 0.05).abs() < 1e-12);
/// assert!((shape.evaluate(500.025) - 50.0).abs() < 1e-9);
/// assert_eq!(shape.symmetry(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakShape {
    pub height: f64,
    pub position: f64,
    pub left_width: f64,
    pub right_width: f64,
    pub kind: PeakShapeKind,
    /// Squared pearson correlation of the shape against the raw samples
    /// of its region.
    pub correlation: f64,
    /// Trapezoidal area of the raw samples of its region.
    pub area: f64,
}

impl PeakShape {
    /// Width parameter used at `x`.
    fn width_at(&self, x: f64) -> f64 {
        if x <= self.position {
            self.left_width
        } else {
            self.right_width
        }
    }

    /// Value of the shape at position `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let arg = self.width_at(x) * (x - self.position);
        match self.kind {
            PeakShapeKind::Lorentzian => self.height / (1.0 + arg * arg),
            PeakShapeKind::Sech2 => {
                let c = arg.cosh();
                self.height / (c * c)
            }
        }
    }

    /// Full width at half maximum.
    pub fn fwhm(&self) -> f64 {
        let half_widths = 1.0 / self.left_width + 1.0 / self.right_width;
        match self.kind {
            PeakShapeKind::Lorentzian => half_widths,
            PeakShapeKind::Sech2 => SECH2_HALF_WIDTH * half_widths,
        }
    }

    /// Ratio of the narrower to the wider flank, 1.0 is symmetric.
    pub fn symmetry(&self) -> f64 {
        let (lo, hi) = if self.left_width < self.right_width {
            (self.left_width, self.right_width)
        } else {
            (self.right_width, self.left_width)
        };
        if hi > 0.0 { lo / hi } else { 0.0 }
    }

    /// Both widths are usable and nothing is NaN.
    pub fn is_valid(&self) -> bool {
        self.height.is_finite()
            && self.height > 0.0
            && self.position.is_finite()
            && self.left_width.is_finite()
            && self.left_width > 0.0
            && self.right_width.is_finite()
            && self.right_width > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(kind: PeakShapeKind, left: f64, right: f64) -> PeakShape {
        PeakShape {
            height: 10.0,
            position: 1.0,
            left_width: left,
            right_width: right,
            kind,
            correlation: 0.0,
            area: 0.0,
        }
    }

    #[test]
    fn test_sech2_half_maximum() {
        let s = shape(PeakShapeKind::Sech2, 2.0, 2.0);
        let hwhm = s.fwhm() / 2.0;
        assert!((s.evaluate(1.0 + hwhm) - 5.0).abs() < 1e-9);
        assert!((s.evaluate(1.0 - hwhm) - 5.0).abs() < 1e-9);
        assert_eq!(s.evaluate(1.0), 10.0);
    }

    #[test]
    fn test_asymmetric_flanks() {
        let s = shape(PeakShapeKind::Lorentzian, 1.0, 4.0);
        assert!((s.evaluate(0.0) - 5.0).abs() < 1e-12);
        assert!((s.evaluate(1.25) - 5.0).abs() < 1e-12);
        assert!((s.fwhm() - 1.25).abs() < 1e-12);
        assert!((s.symmetry() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_validity() {
        assert!(shape(PeakShapeKind::Sech2, 1.0, 1.0).is_valid());
        assert!(!shape(PeakShapeKind::Sech2, 0.0, 1.0).is_valid());
        assert!(!shape(PeakShapeKind::Lorentzian, 1.0, f64::INFINITY).is_valid());
        assert!(!shape(PeakShapeKind::Lorentzian, f64::NAN, 1.0).is_valid());
    }
}
