//! Error types shared across the intake crates

use thiserror::Error;

/// Result type alias for intake helpers
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors raised while reading settings from the environment
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_env_display_names_key_and_value() {
        let err = IntakeError::InvalidEnv {
            key: "SERVER_PORT".to_string(),
            value: "eighty".to_string(),
            reason: "invalid digit found in string".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Invalid value for SERVER_PORT: \"eighty\" (invalid digit found in string)"
        );
    }
}
