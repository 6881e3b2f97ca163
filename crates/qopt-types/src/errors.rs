use thiserror::Error;

/// Main error type for query parameter optimization
#[derive(Error, Debug)]
pub enum QoptError {
    #[error("Missing required field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Invalid shape for '{field}' in {context}: expected {expected}")]
    InvalidShape {
        field: String,
        expected: String,
        context: String,
    },

    #[error("Invalid dimension kind for parameter '{parameter}': {message}")]
    InvalidDimensionKind { parameter: String, message: String },

    #[error(
        "Parameter '{parameter}' must be either a list of discrete values or a mapping with fields {{low, high, distribution, base}}: {description}"
    )]
    InvalidSpaceDescription {
        parameter: String,
        description: String,
    },

    #[error("Unsupported method: {method}, must be one of auto, grid, bayesian or null")]
    UnsupportedMethod { method: String },

    #[error(
        "Number of iterations ({num_iterations}) is not supported for grid search in space '{space}'"
    )]
    InvalidMethodConfiguration { space: String, num_iterations: u64 },

    #[error("Invalid parameter train: {reason}")]
    InvalidParameterTrain { reason: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QoptError {
    pub fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn shape(
        field: impl Into<String>,
        expected: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidShape {
            field: field.into(),
            expected: expected.into(),
            context: context.into(),
        }
    }

    pub fn dimension_kind(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDimensionKind {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for optimization operations
pub type QoptResult<T> = Result<T, QoptError>;

/// Macro for creating parameter train errors
#[macro_export]
macro_rules! train_error {
    ($($arg:tt)*) => {
        $crate::QoptError::InvalidParameterTrain { reason: format!($($arg)*) }
    };
}

/// Macro for creating evaluation errors
#[macro_export]
macro_rules! evaluation_error {
    ($($arg:tt)*) => {
        $crate::QoptError::Evaluation(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = QoptError::missing("name", "space configuration");
        assert!(error.to_string().contains("Missing required field"));
        assert!(error.to_string().contains("'name'"));

        let error = QoptError::InvalidMethodConfiguration {
            space: "bm25".to_string(),
            num_iterations: 50,
        };
        assert!(error.to_string().contains("grid search"));
        assert!(error.to_string().contains("50"));
        assert!(error.to_string().contains("bm25"));
    }

    #[test]
    fn test_space_description_names_parameter() {
        let error = QoptError::InvalidSpaceDescription {
            parameter: "tie_breaker".to_string(),
            description: "\"oops\"".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("'tie_breaker'"));
        assert!(message.contains("{low, high, distribution, base}"));
    }

    #[test]
    fn test_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QoptError = json_error.into();
        match err {
            QoptError::Serialization(_) => (),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_macros() {
        let err = train_error!("must contain at least {} mapping", 1);
        assert!(matches!(err, QoptError::InvalidParameterTrain { .. }));
        assert!(err.to_string().contains("at least 1 mapping"));

        let err = evaluation_error!("endpoint returned {}", 503);
        assert_eq!(err.to_string(), "Evaluation error: endpoint returned 503");
    }
}
