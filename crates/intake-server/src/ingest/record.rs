//! Record types flowing through the ingestion pipeline

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::fields::{
    parse_flag, parse_optional_date, parse_optional_decimal, parse_optional_text, FieldError,
    FieldErrorPolicy,
};
use super::identifier::is_valid_national_id;
use super::normalize::strip_non_digits;

/// Number of fields every record must carry.
pub const RECORD_FIELD_COUNT: usize = 8;

/// Column order of an uploaded record.
pub mod columns {
    pub const NATIONAL_ID: usize = 0;
    pub const IS_PRIVATE: usize = 1;
    pub const IS_INCOMPLETE: usize = 2;
    pub const LAST_PURCHASE_DATE: usize = 3;
    pub const AVERAGE_TICKET: usize = 4;
    pub const LAST_PURCHASE_TICKET: usize = 5;
    pub const MOST_FREQUENT_STORE: usize = 6;
    pub const LAST_PURCHASE_STORE: usize = 7;
}

/// Fields split from one input line. Extra trailing fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line_number: usize,
    pub fields: Vec<String>,
}

/// A per-line data defect. The line is skipped and ingestion continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("incomplete record: expected at least {expected} fields, found {found}")]
    Incomplete { expected: usize, found: usize },

    #[error("malformed line: {0}")]
    Malformed(String),

    #[error("invalid flag: {0}")]
    InvalidFlag(FieldError),

    #[error("invalid national identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid field: {0}")]
    InvalidField(FieldError),

    #[error("rejected by store: {0}")]
    Rejected(String),
}

impl RecordError {
    /// Short machine-readable kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Incomplete { .. } => "incomplete",
            Self::Malformed(_) => "malformed",
            Self::InvalidFlag(_) => "invalid_flag",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidField(_) => "invalid_field",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Typed, validated projection of a [`RawRecord`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    pub national_id: String,
    pub is_private: i32,
    pub is_incomplete: i32,
    pub last_purchase_date: Option<NaiveDate>,
    pub average_ticket: Option<f64>,
    pub last_purchase_ticket: Option<f64>,
    pub most_frequent_store: Option<String>,
    pub last_purchase_store: Option<String>,
}

impl ParsedRecord {
    /// Normalize, parse and validate a raw record.
    ///
    /// Unparseable optional fields follow `policy`; an unparseable flag or a
    /// failed identifier checksum always rejects the record.
    pub fn from_raw(raw: &RawRecord, policy: FieldErrorPolicy) -> Result<Self, RecordError> {
        if raw.fields.len() < RECORD_FIELD_COUNT {
            return Err(RecordError::Incomplete {
                expected: RECORD_FIELD_COUNT,
                found: raw.fields.len(),
            });
        }

        let field = |i: usize| raw.fields[i].as_str();

        let national_id = strip_non_digits(field(columns::NATIONAL_ID));
        let is_private =
            parse_flag("is_private", field(columns::IS_PRIVATE)).map_err(RecordError::InvalidFlag)?;
        let is_incomplete = parse_flag("is_incomplete", field(columns::IS_INCOMPLETE))
            .map_err(RecordError::InvalidFlag)?;

        let line = raw.line_number;
        let last_purchase_date = soften(
            parse_optional_date("last_purchase_date", field(columns::LAST_PURCHASE_DATE)),
            policy,
            line,
        )?;
        let average_ticket = soften(
            parse_optional_decimal("average_ticket", field(columns::AVERAGE_TICKET)),
            policy,
            line,
        )?;
        let last_purchase_ticket = soften(
            parse_optional_decimal("last_purchase_ticket", field(columns::LAST_PURCHASE_TICKET)),
            policy,
            line,
        )?;

        if !is_valid_national_id(&national_id) {
            return Err(RecordError::InvalidIdentifier(national_id));
        }

        Ok(Self {
            national_id,
            is_private,
            is_incomplete,
            last_purchase_date,
            average_ticket,
            last_purchase_ticket,
            most_frequent_store: parse_optional_text(field(columns::MOST_FREQUENT_STORE)),
            last_purchase_store: parse_optional_text(field(columns::LAST_PURCHASE_STORE)),
        })
    }
}

fn soften<T>(
    result: Result<Option<T>, FieldError>,
    policy: FieldErrorPolicy,
    line: usize,
) -> Result<Option<T>, RecordError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => match policy {
            FieldErrorPolicy::NullField => {
                tracing::warn!(line, error = %err, "Unparseable field stored as NULL");
                Ok(None)
            },
            FieldErrorPolicy::RejectRecord => Err(RecordError::InvalidField(err)),
        },
    }
}

/// Aggregate counts for one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionOutcome {
    processed: usize,
    skipped: usize,
}

impl IngestionOutcome {
    pub fn new(processed: usize, skipped: usize) -> Self {
        Self { processed, skipped }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl std::fmt::Display for IngestionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records processed, {} records skipped.",
            self.processed, self.skipped
        )
    }
}
