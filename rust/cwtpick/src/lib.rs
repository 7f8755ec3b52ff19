//! Peak picking on profile signals using a continuous wavelet transform.
//!
//! The entry point is [PeakPickerCwt], built from a [PickerConfig]. It reads
//! any [ProfileSignal] (slices of [RawPoint] or `(position, intensity)`
//! tuples, or parallel arrays through [ProfileArrays]) and returns the
//! picked peaks in discovery order.

pub mod centroid;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod fitting;
pub mod models;
pub mod noise;
pub mod picker;
pub mod quality;
pub mod refine;
pub mod scanner;
pub mod signal;
pub mod transform;
pub mod utils;

pub use config::PickerConfig;
pub use errors::{
    ConfigError,
    DataProcessingError,
};
pub use models::{
    CentroidPeak,
    PeakRecord,
    PeakShape,
    PeakShapeKind,
    PickedPeak,
};
pub use picker::{
    AggregatedPickingSummary,
    PeakPickerCwt,
    PickedSpectrum,
    PickingSummary,
};
pub use refine::{
    PeakRefiner,
    PenalizedGradientRefiner,
    RefinementProblem,
    RefinementSummary,
};
pub use signal::{
    AcquisitionLevel,
    ProfileArrays,
    ProfileSignal,
    RawPoint,
};
