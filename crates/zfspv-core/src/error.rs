// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type shared by the zfspv crates
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// A storage quantity could not be converted to bytes
    #[error("Invalid storage quantity '{value}': {reason}")]
    #[diagnostic(
        code(zfspv::core::invalid_quantity),
        help("Use a Kubernetes quantity such as '10Gi', '500M', '1e9' or a plain byte count")
    )]
    InvalidQuantity {
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(zfspv::core::serialization_error),
        help("Ensure the document is valid JSON or YAML and matches the expected object shape")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_quantity("10Zi", "unknown suffix");
        assert!(matches!(err, CoreError::InvalidQuantity { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid storage quantity '10Zi': unknown suffix"
        );

        let err = CoreError::serialization_error("bad document", None);
        assert!(matches!(err, CoreError::SerializationError { .. }));
    }
}
