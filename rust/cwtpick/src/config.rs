//! Configuration surface of the picker.
//!
//! Every option has a documented default, a config only needs to
//! mention the values it wants to change. Example:
//!
//! ```
//! use cwtpick::PickerConfig;
//!
//! let config = PickerConfig::from_json_str(
//!     r#"{"wavelet": {"scale": 0.05}, "thresholds": {"peak_bound": null}}"#,
//! )
//! .unwrap();
//! assert_eq!(config.wavelet.scale, 0.05);
//! // `null` and missing values fall back to the defaults
//! assert_eq!(config.thresholds.peak_bound, 200.0);
//! assert_eq!(config.wavelet.spacing, 0.001);
//! ```
//!
//! Values of the wrong type are an error:
//!
//! ```
//! use cwtpick::PickerConfig;
//!
//! assert!(PickerConfig::from_json_str(r#"{"wavelet": {"scale": "wide"}}"#).is_err());
//! ```

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::errors::ConfigError;
use crate::transform::{
    MAX_TABLE_POINTS,
    WaveletTransform,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PickerConfig {
    pub wavelet: WaveletConfig,
    pub thresholds: ThresholdConfig,
    pub noise: NoiseConfig,
    pub optimization: OptimizationConfig,
}

/// Parameters of the continuous wavelet transform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveletConfig {
    /// Dilation of the wavelet, in position units. Should be close to the
    /// typical FWHM of the peaks of interest.
    pub scale: f64,
    /// Resolution of the tabulated wavelet, in position units.
    pub spacing: f64,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            scale: 0.15,
            spacing: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Number of samples around a transform maximum where the raw
    /// maximum is searched for.
    pub search_radius: usize,
    /// Minimum raw height of a peak in primary (MS1) spectra.
    pub peak_bound: f64,
    /// Minimum raw height of a peak in secondary (MS2) spectra.
    pub peak_bound_secondary: f64,
    /// Minimum squared correlation between the fitted shape and the data.
    pub correlation: f64,
    /// Minimum full width at half maximum of an accepted peak.
    pub fwhm: f64,
    /// Minimum signal to noise ratio of an accepted peak.
    pub signal_to_noise: f64,
    /// Intensity at or below which a sample is no longer part of a peak.
    pub noise_level: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            search_radius: 3,
            peak_bound: 200.0,
            peak_bound_secondary: 50.0,
            correlation: 0.5,
            fwhm: 0.2,
            signal_to_noise: 3.0,
            noise_level: 10.0,
        }
    }
}

/// Parameters of the median based signal to noise estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    /// Width (in position units) of the window centered on the queried
    /// sample used to estimate the noise.
    pub window_length: f64,
    /// Minimum number of positive samples in a window for its median
    /// to be trusted.
    pub min_required_elements: usize,
    /// Noise value used when a window has too few positive samples.
    pub noise_for_empty_window: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            window_length: 200.0,
            min_required_elements: 10,
            noise_for_empty_window: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PenaltyFactors {
    pub position: f64,
    pub left_width: f64,
    pub right_width: f64,
}

impl Default for PenaltyFactors {
    fn default() -> Self {
        Self {
            position: 0.0,
            left_width: 1.0,
            right_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizationConfig {
    pub enabled: bool,
    pub penalties: PenaltyFactors,
    pub max_iterations: usize,
    pub delta_abs_error: f64,
    pub delta_rel_error: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            penalties: PenaltyFactors::default(),
            max_iterations: 15,
            delta_abs_error: 1e-4,
            delta_rel_error: 1e-4,
        }
    }
}

/// Removes `null` and empty string values so serde falls back
/// to the field defaults for them.
fn prune_empty_values(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_empty_value(v));
            for v in map.values_mut() {
                prune_empty_values(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                prune_empty_values(v);
            }
        }
        _ => {}
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "expected a finite value > 0",
        });
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "expected a finite value >= 0",
        });
    }
    Ok(())
}

impl PickerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(mut value: Value) -> Result<Self, ConfigError> {
        prune_empty_values(&mut value);
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable by the picker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("wavelet.scale", self.wavelet.scale)?;
        check_positive("wavelet.spacing", self.wavelet.spacing)?;
        if self.wavelet.spacing > self.wavelet.scale {
            return Err(ConfigError::InvalidValue {
                field: "wavelet.spacing",
                value: self.wavelet.spacing,
                reason: "spacing must not exceed the wavelet scale",
            });
        }
        if WaveletTransform::table_points(self.wavelet.scale, self.wavelet.spacing)
            > MAX_TABLE_POINTS
        {
            return Err(ConfigError::InvalidValue {
                field: "wavelet.spacing",
                value: self.wavelet.spacing,
                reason: "spacing is too fine for the wavelet scale",
            });
        }

        let th = &self.thresholds;
        check_non_negative("thresholds.peak_bound", th.peak_bound)?;
        check_non_negative("thresholds.peak_bound_secondary", th.peak_bound_secondary)?;
        check_non_negative("thresholds.fwhm", th.fwhm)?;
        check_non_negative("thresholds.signal_to_noise", th.signal_to_noise)?;
        check_non_negative("thresholds.noise_level", th.noise_level)?;
        if !th.correlation.is_finite() || th.correlation > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "thresholds.correlation",
                value: th.correlation,
                reason: "expected a finite value <= 1",
            });
        }

        check_positive("noise.window_length", self.noise.window_length)?;
        check_positive("noise.noise_for_empty_window", self.noise.noise_for_empty_window)?;

        let opt = &self.optimization;
        check_non_negative("optimization.penalties.position", opt.penalties.position)?;
        check_non_negative("optimization.penalties.left_width", opt.penalties.left_width)?;
        check_non_negative("optimization.penalties.right_width", opt.penalties.right_width)?;
        check_non_negative("optimization.delta_abs_error", opt.delta_abs_error)?;
        check_non_negative("optimization.delta_rel_error", opt.delta_rel_error)?;
        if opt.enabled && opt.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "optimization.max_iterations",
                value: 0.0,
                reason: "optimization is enabled but no iterations are allowed",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PickerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = PickerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PickerConfig::default());
    }

    #[test]
    fn test_empty_string_falls_back() {
        let config =
            PickerConfig::from_json_str(r#"{"wavelet": {"spacing": ""}, "noise": null}"#).unwrap();
        assert_eq!(config.wavelet.spacing, 0.001);
        assert_eq!(config.noise, NoiseConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config =
            PickerConfig::from_json_str(r#"{"thresholds": {"charge": 2, "correlation": 0.9}}"#)
                .unwrap();
        assert_eq!(config.thresholds.correlation, 0.9);
    }

    #[test]
    fn test_wrong_type_is_error() {
        let res = PickerConfig::from_json_str(r#"{"thresholds": {"search_radius": -1}}"#);
        assert!(matches!(res, Err(ConfigError::Parse { .. })));
        let res = PickerConfig::from_json_str(r#"{"optimization": {"enabled": "yes"}}"#);
        assert!(matches!(res, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_values() {
        let res = PickerConfig::from_json_str(r#"{"wavelet": {"scale": 0.0}}"#);
        assert!(matches!(
            res,
            Err(ConfigError::InvalidValue {
                field: "wavelet.scale",
                ..
            })
        ));

        let mut config = PickerConfig::default();
        config.optimization.enabled = true;
        config.optimization.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = PickerConfig::default();
        config.wavelet.spacing = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_too_fine_spacing() {
        let mut config = PickerConfig::default();
        config.wavelet.spacing = 1e-12;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "wavelet.spacing",
                ..
            })
        ));

        // 4 * 0.15 / 1e-6 = 600k table points is still fine
        config.wavelet.spacing = 1e-6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_keeps_values() {
        let mut config = PickerConfig::default();
        config.optimization.enabled = true;
        config.thresholds.peak_bound = 12.5;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PickerConfig::from_json_str(&json).unwrap(), config);
    }
}
