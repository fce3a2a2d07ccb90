//! # docflow-engine: Document Workflow Service
//!
//! Drives sales documents from quotation to paid invoice.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Document Workflow                                │
//! │                                                                         │
//! │  caller (POS screen, back office, batch job)                           │
//! │       │  WorkflowContext { actor, alerts }                              │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐   │
//! │  │ WorkflowService              │   │ PaymentProcessor             │   │
//! │  │  create_quotation            │   │  process_cash / process_card │   │
//! │  │  convert_quotation_to_order  │   │  process_transfer / _check   │   │
//! │  │  convert_order_to_invoice ───┼─┐ │  approve / reject            │   │
//! │  │  annul_invoice               │ │ └──────────────┬───────────────┘   │
//! │  └──────────────┬───────────────┘ │                │                   │
//! │                 │ one bounded     │ low-stock      │                   │
//! │                 │ transaction     ▼ alert          │                   │
//! │                 │            alert worker ──► AlertSink                 │
//! │                 ▼                                  ▼                   │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ docflow-db: repositories, sequences, inventory, accounting      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docflow_engine::{
//!     spawn_alert_worker, EngineConfig, PaymentProcessor, TracingAlertSink,
//!     WorkflowContext, WorkflowService,
//! };
//!
//! let config = Arc::new(EngineConfig::load(None)?);
//! let db = Database::new(config.db_config()).await?;
//! let (alerts, _worker) = spawn_alert_worker(TracingAlertSink, db.inventory());
//! let ctx = WorkflowContext::new(actor, alerts);
//!
//! let workflow = WorkflowService::new(db.clone(), config.clone());
//! let order = workflow.convert_quotation_to_order(&ctx, &quotation.id).await?;
//! let invoice = workflow.convert_order_to_invoice(&ctx, &order.id).await?;
//!
//! let payments = PaymentProcessor::new(db, config);
//! let receipt = payments.process_cash(&ctx, &invoice.id, Money::from_cents(3000)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod payments;
pub mod telemetry;
pub mod workflow;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use context::{
    spawn_alert_worker, AlertError, AlertHandle, AlertSink, LowStockAlert, LowStockItem,
    TracingAlertSink, WorkflowContext,
};
pub use error::{ConfigError, ConflictReason, WorkflowError, WorkflowResult};
pub use payments::{CardKind, CardOutcome, CardPayment, CashReceipt, PaymentProcessor};
pub use workflow::{CreateQuotation, QuotationLine, WorkflowService};
