use std::fmt::Display;

use tracing::debug;

use crate::config::ThresholdConfig;
use crate::models::PeakShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    Correlation,
    Fwhm,
    SignalToNoise,
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Correlation => write!(f, "correlation"),
            RejectionReason::Fwhm => write!(f, "fwhm"),
            RejectionReason::SignalToNoise => write!(f, "signal to noise"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    Rejected(RejectionReason),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }
}

/// Final acceptance check of a fitted peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_correlation: f64,
    pub min_fwhm: f64,
    pub min_signal_to_noise: f64,
}

impl From<&ThresholdConfig> for QualityGate {
    fn from(value: &ThresholdConfig) -> Self {
        Self {
            min_correlation: value.correlation,
            min_fwhm: value.fwhm,
            min_signal_to_noise: value.signal_to_noise,
        }
    }
}

impl QualityGate {
    /// Checks correlation, then FWHM, then signal to noise.
    /// NaN never passes a check.
    pub fn evaluate(&self, shape: &PeakShape, signal_to_noise: f64) -> GateDecision {
        let decision = if !(shape.correlation >= self.min_correlation) {
            GateDecision::Rejected(RejectionReason::Correlation)
        } else if !(shape.fwhm() >= self.min_fwhm) {
            GateDecision::Rejected(RejectionReason::Fwhm)
        } else if !(signal_to_noise >= self.min_signal_to_noise) {
            GateDecision::Rejected(RejectionReason::SignalToNoise)
        } else {
            GateDecision::Accepted
        };

        if let GateDecision::Rejected(reason) = decision {
            debug!(
                "Rejected peak at {:.5} on {}: correlation {:.3}, fwhm {:.5}, s/n {:.2}",
                shape.position,
                reason,
                shape.correlation,
                shape.fwhm(),
                signal_to_noise
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeakShapeKind;

    fn gate() -> QualityGate {
        QualityGate {
            min_correlation: 0.5,
            min_fwhm: 0.1,
            min_signal_to_noise: 3.0,
        }
    }

    fn shape(correlation: f64, width: f64) -> PeakShape {
        PeakShape {
            height: 10.0,
            position: 0.0,
            left_width: width,
            right_width: width,
            kind: PeakShapeKind::Lorentzian,
            correlation,
            area: 1.0,
        }
    }

    #[test]
    fn test_accepts_at_bounds() {
        // FWHM of 2 / 20 = 0.1
        let decision = gate().evaluate(&shape(0.5, 20.0), 3.0);
        assert!(decision.is_accepted());
    }

    #[test]
    fn test_rejection_reasons() {
        let g = gate();
        assert_eq!(
            g.evaluate(&shape(0.4, 1.0), 10.0),
            GateDecision::Rejected(RejectionReason::Correlation)
        );
        assert_eq!(
            g.evaluate(&shape(0.9, 100.0), 10.0),
            GateDecision::Rejected(RejectionReason::Fwhm)
        );
        assert_eq!(
            g.evaluate(&shape(0.9, 1.0), 2.0),
            GateDecision::Rejected(RejectionReason::SignalToNoise)
        );
        assert_eq!(
            g.evaluate(&shape(0.9, 1.0), f64::NAN),
            GateDecision::Rejected(RejectionReason::SignalToNoise)
        );
    }

    #[test]
    fn test_from_thresholds() {
        let g = QualityGate::from(&ThresholdConfig::default());
        assert_eq!(g.min_correlation, 0.5);
        assert_eq!(g.min_fwhm, 0.2);
        assert_eq!(g.min_signal_to_noise, 3.0);
    }
}
