//! # Workflow Error Types
//!
//! What callers of the workflow service and payment processor see.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Workflow Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Validation     │  │  NotFound       │  │  Conflict               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  bad input,     │  │  unknown        │  │  AlreadyConverted       │ │
//! │  │  unknown client │  │  quotation /    │  │  AlreadyInvoiced        │ │
//! │  │  or product     │  │  order /        │  │  InsufficientStock      │ │
//! │  │                 │  │  invoice /      │  │  AlreadyAnnulled        │ │
//! │  │                 │  │  payment id     │  │  AlreadyPaid            │ │
//! │  │                 │  │                 │  │  PaymentNotPending      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Persistence    │  │ PaymentDeclined │                              │
//! │  │                 │  │                 │                              │
//! │  │  DbError,       │  │ card declined   │                              │
//! │  │  incl. Timeout  │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Every error is raised before commit: the transaction rolls back.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use docflow_core::{CoreError, ValidationError};
use docflow_db::{DbError, StockError};

/// Result type alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Why a state transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("quotation already converted to an order")]
    AlreadyConverted,

    #[error("order already invoiced")]
    AlreadyInvoiced,

    #[error("insufficient stock for {product_code}: available {available}, requested {requested}")]
    InsufficientStock {
        product_code: String,
        available: i64,
        requested: i64,
    },

    #[error("invoice already annulled")]
    AlreadyAnnulled,

    #[error("invoice already paid")]
    AlreadyPaid,

    #[error("payment is not pending")]
    PaymentNotPending,
}

/// Errors returned by workflow and payment operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the conflict reason, if this is a conflict.
    pub fn conflict(&self) -> Option<&ConflictReason> {
        match self {
            WorkflowError::Conflict(reason) => Some(reason),
            _ => None,
        }
    }

    /// `true` when retrying the same call could succeed.
    ///
    /// Only lock contention and timeouts qualify; validation failures and
    /// conflicts will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Persistence(
                DbError::Timeout { .. } | DbError::PoolExhausted | DbError::TransactionFailed(_)
            )
        )
    }
}

impl From<ConflictReason> for WorkflowError {
    fn from(reason: ConflictReason) -> Self {
        WorkflowError::Conflict(reason)
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        WorkflowError::Persistence(err.into())
    }
}

impl From<CoreError> for WorkflowError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => WorkflowError::Validation(v),
            CoreError::DiscountExceedsSubtotal { discount_bps } => {
                WorkflowError::Validation(ValidationError::OutOfRange {
                    field: format!("combined discount ({discount_bps} bps)"),
                    min: 0,
                    max: 10_000,
                })
            }
            CoreError::InsufficientStock {
                product_code,
                available,
                requested,
            } => WorkflowError::Conflict(ConflictReason::InsufficientStock {
                product_code,
                available,
                requested,
            }),
            CoreError::SequenceExhausted { prefix, day } => {
                WorkflowError::Persistence(DbError::SequenceExhausted { prefix, day })
            }
            CoreError::InvalidDocumentNumber(number) => {
                WorkflowError::Validation(ValidationError::InvalidFormat {
                    field: "document_number".to_string(),
                    reason: format!("'{number}' is not PREFIX-YYYYMMDD-NNNN"),
                })
            }
        }
    }
}

impl From<StockError> for WorkflowError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                product_code,
                available,
                requested,
            } => WorkflowError::Conflict(ConflictReason::InsufficientStock {
                product_code,
                available,
                requested,
            }),
            StockError::UnknownProduct(code) => WorkflowError::not_found("Product", code),
            StockError::InvalidQuantity(_) => WorkflowError::Validation(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }),
            StockError::Db(e) => WorkflowError::Persistence(e),
        }
    }
}

// =============================================================================
// Transaction Bound
// =============================================================================

/// Runs `operation` with a deadline.
///
/// On expiry the future is dropped, which drops its open transaction and
/// rolls it back, and `DbError::Timeout` is returned.
pub(crate) async fn within<T, F>(limit: Duration, operation: F) -> WorkflowResult<T>
where
    F: Future<Output = WorkflowResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(WorkflowError::Persistence(DbError::Timeout {
            seconds: limit.as_secs(),
        })),
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Failures while loading or validating [`crate::config::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}
