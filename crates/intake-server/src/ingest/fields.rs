//! Typed field parsing
//!
//! Raw text fields become typed optional values. The literal `NULL` (any case)
//! and empty or whitespace-only strings mean "absent" and are never errors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::normalize::normalize_text;

/// Calendar date format accepted in uploads and used when re-serializing.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sentinel token for an absent value.
pub const NULL_TOKEN: &str = "NULL";

/// A single field that could not be parsed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{field}: invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("{field}: invalid decimal {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("{field}: invalid integer {value:?}")]
    InvalidInteger { field: &'static str, value: String },
}

/// What to do with an optional field that is present but unparseable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorPolicy {
    /// Log the defect and store the field as absent
    #[default]
    NullField,
    /// Skip the whole record
    RejectRecord,
}

impl std::str::FromStr for FieldErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "null_field" | "null" => Ok(Self::NullField),
            "reject_record" | "reject" => Ok(Self::RejectRecord),
            other => Err(format!(
                "unknown field error policy '{other}', expected null_field or reject_record"
            )),
        }
    }
}

impl std::fmt::Display for FieldErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullField => write!(f, "null_field"),
            Self::RejectRecord => write!(f, "reject_record"),
        }
    }
}

/// `NULL` in any case, or nothing but whitespace.
pub fn is_null_token(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case(NULL_TOKEN)
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_optional_date(
    field: &'static str,
    s: &str,
) -> Result<Option<NaiveDate>, FieldError> {
    if is_null_token(s) {
        return Ok(None);
    }

    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map(Some)
        .map_err(|_| FieldError::InvalidDate {
            field,
            value: s.to_string(),
        })
}

/// Parse a decimal amount, accepting `,` as the decimal separator.
pub fn parse_optional_decimal(field: &'static str, s: &str) -> Result<Option<f64>, FieldError> {
    if is_null_token(s) {
        return Ok(None);
    }

    let invalid = || FieldError::InvalidDecimal {
        field,
        value: s.to_string(),
    };

    let value: f64 = s.trim().replace(',', ".").parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }

    Ok(Some(value))
}

/// Parse one of the mandatory integer flags. There is no absent value here.
pub fn parse_flag(field: &'static str, s: &str) -> Result<i32, FieldError> {
    s.trim().parse().map_err(|_| FieldError::InvalidInteger {
        field,
        value: s.to_string(),
    })
}

/// Normalize a free-text field, mapping the null token to `None`.
pub fn parse_optional_text(s: &str) -> Option<String> {
    if is_null_token(s) {
        None
    } else {
        Some(normalize_text(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_tokens() {
        for token in ["NULL", "null", "Null", "", "   ", "\t"] {
            assert!(is_null_token(token), "{token:?} should be null");
        }
        assert!(!is_null_token("NULLS"));
        assert!(!is_null_token("0"));
    }

    #[test]
    fn test_optional_fields_absent_for_null() {
        for token in ["NULL", "nUlL", ""] {
            assert_eq!(parse_optional_date("date", token), Ok(None));
            assert_eq!(parse_optional_decimal("amount", token), Ok(None));
            assert_eq!(parse_optional_text(token), None);
        }
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_optional_date("date", " 2013-06-12 ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2013, 6, 12));
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        for value in ["12/06/2013", "2013-13-01", "2013-02-30", "yesterday"] {
            assert!(
                matches!(
                    parse_optional_date("last_purchase_date", value),
                    Err(FieldError::InvalidDate { .. })
                ),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_decimal_accepts_comma_and_dot() {
        let comma = parse_optional_decimal("amount", "1234,56").unwrap();
        let dot = parse_optional_decimal("amount", "1234.56").unwrap();
        assert_eq!(comma, Some(1234.56));
        assert_eq!(comma, dot);
    }

    #[test]
    fn test_decimal_rejects_garbage_and_non_finite() {
        for value in ["12a", "1.2.3", "NaN", "inf"] {
            assert!(
                parse_optional_decimal("amount", value).is_err(),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag("is_private", "0"), Ok(0));
        assert_eq!(parse_flag("is_private", " 1 "), Ok(1));
        assert!(matches!(
            parse_flag("is_private", "NULL"),
            Err(FieldError::InvalidInteger { field: "is_private", .. })
        ));
        assert!(parse_flag("is_private", "1.0").is_err());
    }

    #[test]
    fn test_optional_text_is_normalized() {
        assert_eq!(parse_optional_text(" loja são paulo "), Some("LOJA SÃO PAULO".to_string()));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("null_field".parse::<FieldErrorPolicy>(), Ok(FieldErrorPolicy::NullField));
        assert_eq!("reject-record".parse::<FieldErrorPolicy>(), Ok(FieldErrorPolicy::RejectRecord));
        assert!("drop".parse::<FieldErrorPolicy>().is_err());
        assert_eq!(FieldErrorPolicy::default().to_string(), "null_field");
    }
}
