//! Environment variable helpers
//!
//! Unset variables fall back to the supplied default. A variable that is set
//! but cannot be parsed is an error rather than being silently replaced.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{IntakeError, Result};

/// Read `key` and parse it, falling back to `default` when it is unset or blank.
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

/// Read `key` and parse it, returning `None` when it is unset or blank.
pub fn parse_optional<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| IntakeError::InvalidEnv {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(IntakeError::InvalidEnv {
            key: key.to_string(),
            value: String::new(),
            reason: "not valid unicode".to_string(),
        }),
    }
}

/// Read a string variable with a default.
pub fn string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_when_unset() {
        std::env::remove_var("INTAKE_TEST_UNSET_PORT");
        assert_eq!(parse_or("INTAKE_TEST_UNSET_PORT", 8080u16).unwrap(), 8080);
    }

    #[test]
    fn test_parse_or_reads_value() {
        std::env::set_var("INTAKE_TEST_SET_PORT", " 9090 ");
        assert_eq!(parse_or("INTAKE_TEST_SET_PORT", 8080u16).unwrap(), 9090);
        std::env::remove_var("INTAKE_TEST_SET_PORT");
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        std::env::set_var("INTAKE_TEST_BAD_PORT", "eighty");
        let err = parse_or("INTAKE_TEST_BAD_PORT", 8080u16).unwrap_err();
        assert!(err.to_string().contains("INTAKE_TEST_BAD_PORT"));
        std::env::remove_var("INTAKE_TEST_BAD_PORT");
    }

    #[test]
    fn test_blank_is_unset() {
        std::env::set_var("INTAKE_TEST_BLANK", "   ");
        assert_eq!(parse_optional::<u32>("INTAKE_TEST_BLANK").unwrap(), None);
        assert_eq!(string_or("INTAKE_TEST_BLANK", "fallback"), "fallback");
        std::env::remove_var("INTAKE_TEST_BLANK");
    }
}
