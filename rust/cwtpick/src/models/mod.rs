mod peak_shape;
mod picked_peak;

pub use peak_shape::{
    PeakShape,
    PeakShapeKind,
};
pub use picked_peak::{
    CentroidPeak,
    PeakRecord,
    PickedPeak,
};
