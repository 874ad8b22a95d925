use thiserror::Error;

/// Main error type for the Autotune system.
///
/// Every variant is fatal: the engine favors failing a tuning run over
/// accepting a cost it cannot trust.
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to evaluate the constraint expression \"{expression}\": {message}")]
    ConstraintEvaluation { expression: String, message: String },

    #[error("Code transformer returned {variants} variants for configuration {key}, expected exactly one")]
    TransformAmbiguity { key: String, variants: usize },

    #[error(
        "The search cannot find a valid set of performance parameters. \
         The search time limit or run budget might be too small, or the \
         performance parameter constraint might prune out the entire search space"
    )]
    SearchExhausted,

    #[error("Invalid random range: lower bound {low} is greater than upper bound {high}")]
    InvalidRange { low: String, high: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TuneError {
    pub fn constraint(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintEvaluation {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn invalid_range<T: std::fmt::Display>(low: T, high: T) -> Self {
        Self::InvalidRange {
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

/// Result type alias for Autotune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

/// Macro for creating driver errors
#[macro_export]
macro_rules! driver_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Driver(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TuneError::constraint("T1 <= T2 and", "unexpected end of expression");

        assert!(error.to_string().contains("T1 <= T2 and"));
        assert!(error.to_string().contains("unexpected end"));
    }

    #[test]
    fn test_exhausted_message_gives_guidance() {
        let message = TuneError::SearchExhausted.to_string();
        assert!(message.contains("time limit"));
        assert!(message.contains("constraint"));
    }

    #[test]
    fn test_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: TuneError = io.into();

        match error {
            TuneError::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("Missing required field: {}", "axis_names");
        assert!(matches!(config_err, TuneError::Config(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, TuneError::Internal(_)));
        let driver_err = driver_error!("exit status {}", 2);
        assert!(driver_err.to_string().contains("exit status 2"));
    }

    #[test]
    fn test_invalid_range_records_bounds() {
        let error = TuneError::invalid_range(5, 2);
        assert!(error.to_string().contains("lower bound 5"));
        assert!(error.to_string().contains("upper bound 2"));
    }
}
