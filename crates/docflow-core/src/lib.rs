//! # docflow-core: Pure Business Logic for the Document Workflow
//!
//! This crate holds the domain model of the quotation → order → invoice →
//! payment cycle as plain data and pure functions. It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Document Workflow Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Callers (screens, exporters, reporting)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    docflow-engine                               │   │
//! │  │    WorkflowService, PaymentProcessor, alert worker, config      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ docflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ validation│  │   │
//! │  │   │ Quotation │  │   Money   │  │  Pricing  │  │   rules   │  │   │
//! │  │   │  Invoice  │  │  portion  │  │ cost of   │  │  checks   │  │   │
//! │  │   │  Payment  │  │           │  │  goods    │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    docflow-db (Database Layer)                  │   │
//! │  │     SQLite repositories, sequence counter, stock, ledger        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Quotation, Order, Invoice, Payment, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`totals`] - Subtotal / discount / tax / total calculation
//! - [`sequence`] - `PREFIX-YYYYMMDD-NNNN` document numbers
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use docflow_core::money::Money;
//! use docflow_core::types::TaxRate;
//!
//! let taxable = Money::from_cents(1900); // $19.00 after discount
//! let tax = taxable.calculate_tax(TaxRate::from_bps(1600));
//! assert_eq!(tax.cents(), 304);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod sequence;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use sequence::SequenceNumber;
pub use totals::Pricing;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single document.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Maximum quantity on a single line.
///
/// Guards against typing 10000 instead of 10.
pub const MAX_LINE_QUANTITY: i64 = 9_999;
