//! # Error Types
//!
//! Domain-specific error types for docflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  docflow-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule failures                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  docflow-db errors                                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── StockError       - Conditional stock deduction failures           │
//! │                                                                         │
//! │  docflow-engine errors                                                 │
//! │  └── WorkflowError    - What callers see (typed, never a bare String)  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → WorkflowError → Caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule failures detected by pure domain code.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds stock on hand.
    #[error("Insufficient stock for {product_code}: available {available}, requested {requested}")]
    InsufficientStock {
        product_code: String,
        available: i64,
        requested: i64,
    },

    /// The daily counter went past the four digits the number format allows.
    #[error("Sequence exhausted for {prefix} on {day}")]
    SequenceExhausted { prefix: String, day: String },

    /// A document number could not be parsed.
    #[error("Invalid document number '{0}'")]
    InvalidDocumentNumber(String),

    /// Combined discounts exceed the subtotal.
    #[error("Total discount of {discount_bps} bps exceeds 100%")]
    DiscountExceedsSubtotal { discount_bps: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any database work starts, so they never leave partial
/// writes behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A referenced record does not exist or is inactive.
    #[error("{field} '{value}' does not exist or is inactive")]
    UnknownReference { field: String, value: String },

    /// Requested quantity is above what the catalog shows as available.
    #[error("quantity {requested} of {product_code} exceeds available stock {available}")]
    ExceedsAvailableStock {
        product_code: String,
        available: i64,
        requested: i64,
    },

    /// Serialized products are sold one unit per line.
    #[error("{product_code} is serialized and cannot have quantity {requested} on one line")]
    SerializedQuantity { product_code: String, requested: i64 },

    /// Cash tendered does not cover the invoice.
    #[error("amount tendered {tendered} is less than invoice total {total}")]
    InsufficientTender { tendered: i64, total: i64 },

    /// Duplicate value (e.g., duplicate product code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn unknown(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::UnknownReference {
            field: field.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
