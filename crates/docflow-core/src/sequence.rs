//! # Document Sequence Numbers
//!
//! Formatting and parsing of human-readable document numbers.
//!
//! ```text
//!   FACT-20240315-0007
//!   ──┬─ ───┬──── ─┬──
//!     │     │      └── counter, 4 digits, resets daily (1..=9999)
//!     │     └───────── UTC day the document was created
//!     └─────────────── kind prefix (COT / ORD / FACT)
//! ```
//!
//! Allocation of the counter value is the database's job
//! (`docflow-db::sequence`); this module only turns values into strings and
//! back.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::types::DocumentKind;

/// Largest counter value the four-digit format can hold.
pub const MAX_DAILY_SEQUENCE: i64 = 9_999;

/// A parsed document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceNumber {
    pub kind: DocumentKind,
    pub day: NaiveDate,
    pub value: i64,
}

impl SequenceNumber {
    /// Builds a number, rejecting counters outside `1..=9999`.
    pub fn new(kind: DocumentKind, day: NaiveDate, value: i64) -> Result<Self, CoreError> {
        if value > MAX_DAILY_SEQUENCE {
            return Err(CoreError::SequenceExhausted {
                prefix: kind.prefix().to_string(),
                day: day_key(day),
            });
        }
        if value < 1 {
            return Err(CoreError::InvalidDocumentNumber(format!(
                "{}-{}-{value}",
                kind.prefix(),
                day_key(day)
            )));
        }
        Ok(SequenceNumber { kind, day, value })
    }
}

/// `YYYYMMDD` key used by the counter table.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:04}",
            self.kind.prefix(),
            day_key(self.day),
            self.value
        )
    }
}

impl FromStr for SequenceNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidDocumentNumber(s.to_string());

        let mut parts = s.split('-');
        let (Some(prefix), Some(day), Some(counter), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let kind = DocumentKind::from_prefix(prefix).ok_or_else(invalid)?;
        if day.len() != 8 || counter.len() != 4 {
            return Err(invalid());
        }
        let day = NaiveDate::parse_from_str(day, "%Y%m%d").map_err(|_| invalid())?;
        let value: i64 = counter.parse().map_err(|_| invalid())?;

        SequenceNumber::new(kind, day, value).map_err(|_| invalid())
    }
}
