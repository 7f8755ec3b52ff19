use serde::{
    Deserialize,
    Serialize,
};

use super::peak_shape::{
    PeakShape,
    PeakShapeKind,
};

/// Output record types the picker can fill.
///
/// Implement this to have [crate::PeakPickerCwt::pick_into] build
/// your own peak type directly.
pub trait PeakRecord {
    fn from_shape(shape: &PeakShape, signal_to_noise: f64) -> Self;
}

/// Full description of an accepted peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickedPeak {
    pub position: f64,
    pub height: f64,
    pub fwhm: f64,
    pub signal_to_noise: f64,
    pub correlation: f64,
    pub left_width: f64,
    pub right_width: f64,
    pub area: f64,
    pub kind: PeakShapeKind,
}

impl PeakRecord for PickedPeak {
    fn from_shape(shape: &PeakShape, signal_to_noise: f64) -> Self {
        Self {
            position: shape.position,
            height: shape.height,
            fwhm: shape.fwhm(),
            signal_to_noise,
            correlation: shape.correlation,
            left_width: shape.left_width,
            right_width: shape.right_width,
            area: shape.area,
            kind: shape.kind,
        }
    }
}

/// Centroided peak, just a position and an intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CentroidPeak {
    pub position: f64,
    pub intensity: f64,
}

impl PeakRecord for CentroidPeak {
    fn from_shape(shape: &PeakShape, _signal_to_noise: f64) -> Self {
        Self {
            position: shape.position,
            intensity: shape.height,
        }
    }
}
