//! Error types and validation functions for model calibration.
//!
//! Every estimator returns [`EstimationResult`]. Structural problems with the input
//! (too few observations, an underdetermined regression, an invalid configuration)
//! surface as an [`EstimationError`] scoped to one model; the calibrator downgrades
//! each of them to a warning so that the remaining models still run.

use thiserror::Error;

/// Error types for calibration operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EstimationError {
    /// Insufficient data for the requested estimator.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Invalid parameter value in a configuration or function argument.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// A bar violated the OHLCV ordering invariants.
    #[error("Invalid bar: {reason}")]
    InvalidBar {
        /// Which invariant was violated
        reason: String,
    },

    /// Numerical computation error due to instability or a degenerate input.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
        /// Operation that failed
        operation: Option<String>,
    },

    /// An iterative algorithm failed in every attempt.
    #[error("{algorithm} failed: {reason}")]
    ConvergenceFailure {
        /// Algorithm name
        algorithm: String,
        /// Reason for failure
        reason: String,
    },

    /// Bootstrap resampling error.
    #[error("Bootstrap resampling failed: {reason}")]
    BootstrapError {
        /// Reason for bootstrap failure
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization failed ({format}): {reason}")]
    SerializationError {
        /// Format that failed
        format: String,
        /// Underlying message
        reason: String,
    },
}

/// Result type for calibration operations.
///
/// This is a convenience type alias for operations that may fail with [`EstimationError`].
pub type EstimationResult<T> = Result<T, EstimationError>;

/// Validates that data has sufficient length for an estimator.
///
/// # Example
/// ```rust
/// use stochastic_calibrator::errors::validate_data_length;
///
/// let data = vec![1.0, 2.0, 3.0];
/// assert!(validate_data_length(&data, 2, "test").is_ok());
/// assert!(validate_data_length(&data, 5, "test").is_err());
/// ```
pub fn validate_data_length(
    data: &[f64],
    min_required: usize,
    operation: &str,
) -> EstimationResult<()> {
    if data.len() < min_required {
        log::debug!(
            "{}: {} observations, {} required",
            operation,
            data.len(),
            min_required
        );
        Err(EstimationError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter is within inclusive bounds.
///
/// # Example
/// ```rust
/// use stochastic_calibrator::errors::validate_parameter;
///
/// assert!(validate_parameter(0.95, 0.0, 1.0, "confidence_level").is_ok());
/// assert!(validate_parameter(1.5, 0.0, 1.0, "confidence_level").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> EstimationResult<()> {
    if value.is_nan() {
        return Err(EstimationError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(EstimationError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
            operation: None,
        });
    }

    if value < min || value > max {
        Err(EstimationError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value.
pub fn validate_all_finite(data: &[f64], name: &str) -> EstimationResult<()> {
    if let Some((i, value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(EstimationError::NumericalError {
            reason: format!("{} contains non-finite value at index {}: {}", name, i, value),
            operation: None,
        });
    }
    Ok(())
}
