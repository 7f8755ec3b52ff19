use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use crate::errors::DataProcessingError;

/// Anything that can be read as an ordered profile signal.
///
/// Implementors must return positions in strictly increasing order.
/// The picker only ever reads through this trait, it never mutates
/// the caller's data.
pub trait ProfileSignal {
    fn len(&self) -> usize;
    fn position(&self, idx: usize) -> f64;
    fn intensity(&self, idx: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single (position, intensity) sample of a profile signal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPoint {
    pub position: f64,
    pub intensity: f64,
}

impl RawPoint {
    pub fn new(position: f64, intensity: f64) -> Self {
        Self {
            position,
            intensity,
        }
    }
}

impl ProfileSignal for [RawPoint] {
    fn len(&self) -> usize {
        <[RawPoint]>::len(self)
    }
    fn position(&self, idx: usize) -> f64 {
        self[idx].position
    }
    fn intensity(&self, idx: usize) -> f64 {
        self[idx].intensity
    }
}

impl ProfileSignal for Vec<RawPoint> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }
    fn position(&self, idx: usize) -> f64 {
        self[idx].position
    }
    fn intensity(&self, idx: usize) -> f64 {
        self[idx].intensity
    }
}

impl ProfileSignal for [(f64, f64)] {
    fn len(&self) -> usize {
        <[(f64, f64)]>::len(self)
    }
    fn position(&self, idx: usize) -> f64 {
        self[idx].0
    }
    fn intensity(&self, idx: usize) -> f64 {
        self[idx].1
    }
}

impl ProfileSignal for Vec<(f64, f64)> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }
    fn position(&self, idx: usize) -> f64 {
        self[idx].0
    }
    fn intensity(&self, idx: usize) -> f64 {
        self[idx].1
    }
}

/// Intensity types accepted by [ProfileArrays].
pub trait IntensityValue: Copy {
    fn as_f64(self) -> f64;
}

impl IntensityValue for f32 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl IntensityValue for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

/// Borrowed view over parallel position and intensity arrays,
/// the usual layout of a profile spectrum.
///
/// ```
/// use cwtpick::{ProfileArrays, ProfileSignal};
///
/// let mz = [100.0, 100.001, 100.002];
/// let intensity = [1.0f32, 5.0, 1.0];
/// let view = ProfileArrays::try_new(&mz, &intensity).unwrap();
/// assert_eq!(view.len(), 3);
/// assert_eq!(view.intensity(1), 5.0);
///
/// assert!(ProfileArrays::try_new(&mz, &intensity[..2]).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ProfileArrays<'a, I: IntensityValue> {
    positions: &'a [f64],
    intensities: &'a [I],
}

impl<'a, I: IntensityValue> ProfileArrays<'a, I> {
    pub fn try_new(
        positions: &'a [f64],
        intensities: &'a [I],
    ) -> Result<Self, DataProcessingError> {
        if positions.len() != intensities.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: positions.len(),
                other: intensities.len(),
                context: "ProfileArrays::try_new".to_string(),
            });
        }
        Ok(Self {
            positions,
            intensities,
        })
    }
}

impl<I: IntensityValue> ProfileSignal for ProfileArrays<'_, I> {
    fn len(&self) -> usize {
        self.positions.len()
    }
    fn position(&self, idx: usize) -> f64 {
        self.positions[idx]
    }
    fn intensity(&self, idx: usize) -> f64 {
        self.intensities[idx].as_f64()
    }
}

/// Selects which pair of height thresholds applies to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionLevel {
    Primary,
    Secondary,
}

impl AcquisitionLevel {
    /// Maps an MS level number, anything above 1 is a tandem spectrum.
    pub fn from_ms_level(ms_level: u8) -> Self {
        if ms_level <= 1 {
            AcquisitionLevel::Primary
        } else {
            AcquisitionLevel::Secondary
        }
    }
}

impl From<u8> for AcquisitionLevel {
    fn from(value: u8) -> Self {
        Self::from_ms_level(value)
    }
}

/// Private, owned copy of the signal that the depletion loop zeroes
/// out region by region.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSignal {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

impl WorkingSignal {
    pub fn from_signal<S: ProfileSignal + ?Sized>(signal: &S) -> Self {
        let n = signal.len();
        let mut positions = Vec::with_capacity(n);
        let mut intensities = Vec::with_capacity(n);
        for i in 0..n {
            positions.push(signal.position(i));
            // Negative or nan intensities would break the area and
            // centroid math downstream.
            let int = signal.intensity(i);
            intensities.push(if int.is_finite() && int > 0.0 {
                int
            } else {
                0.0
            });
        }
        if !positions.windows(2).all(|w| w[0] < w[1]) {
            warn!("Profile signal positions are not strictly increasing, picks may be unreliable");
        }
        Self {
            positions,
            intensities,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Sets the intensities in `[left, right]` to zero.
    /// Indices past the end are ignored.
    pub fn zero_region(&mut self, left: usize, right: usize) {
        let n = self.intensities.len();
        if n == 0 || left >= n {
            return;
        }
        let right = right.min(n - 1);
        if left > right {
            return;
        }
        self.intensities[left..=right].fill(0.0);
    }
}

impl ProfileSignal for WorkingSignal {
    fn len(&self) -> usize {
        self.positions.len()
    }
    fn position(&self, idx: usize) -> f64 {
        self.positions[idx]
    }
    fn intensity(&self, idx: usize) -> f64 {
        self.intensities[idx]
    }
}
