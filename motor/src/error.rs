use thiserror::Error;

/// Rejected tunables in one of the motor config structs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be finite and non-negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    #[error("`{field}` must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("`{field}` must lie in [0, 1] (got {value})")]
    NotAFraction { field: &'static str, value: f32 },
    #[error("`{min_field}` ({min}) exceeds `{max_field}` ({max})")]
    InvertedRange {
        min_field: &'static str,
        min: f32,
        max_field: &'static str,
        max: f32,
    },
}

/// Rejected path input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    #[error("path has no waypoints")]
    Empty,
    #[error("waypoint {index} has a non-finite position")]
    NonFinite { index: usize },
    #[error("cursor {cursor} is out of range for a path of {len} waypoints")]
    CursorOutOfRange { cursor: usize, len: usize },
}

/// Field validators shared by the config builders.
pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn positive(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn fraction(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::NotAFraction { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validators_reject_nan() {
        assert!(non_negative("x", f32::NAN).is_err());
        assert!(positive("x", f32::NAN).is_err());
        assert!(fraction("x", f32::NAN).is_err());
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = positive("turn_rate", 0.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`turn_rate` must be greater than zero (got 0)"
        );
    }
}
