use std::fmt::Display;

/// Errors raised while building or validating a [crate::PickerConfig].
///
/// These are the only failures that cross the picker boundary, everything
/// else (missed detections, rejected fits) is regular control flow.
#[derive(Debug)]
pub enum ConfigError {
    /// A value was present but could not be parsed into the expected type.
    Parse { msg: String },
    /// A value parsed fine but is outside of the domain the picker supports.
    InvalidValue {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse { msg } => write!(f, "Error parsing picker config: {}", msg),
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => write!(
                f,
                "Invalid value for '{}': {} ({})",
                field, value, reason
            ),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(val: serde_json::Error) -> Self {
        ConfigError::Parse {
            msg: val.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedNonEmptyData {
        context: Option<String>,
    },
}

impl DataProcessingError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        match &mut self {
            DataProcessingError::ExpectedSlicesSameLength {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::ExpectedNonEmptyData {
                context: owned_context,
            } => match owned_context {
                Some(x) => x.push_str(context),
                None => *owned_context = Some(context.to_string()),
            },
        }
        self
    }
}

impl Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataProcessingError::ExpectedSlicesSameLength {
                expected,
                other,
                context,
            } => write!(
                f,
                "Expected slices of the same length, got {} and {} ({})",
                expected, other, context
            ),
            DataProcessingError::ExpectedNonEmptyData { context } => match context {
                Some(x) => write!(f, "Expected non-empty data ({})", x),
                None => write!(f, "Expected non-empty data"),
            },
        }
    }
}
