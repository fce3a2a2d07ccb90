//! # docflow-db: Database Layer for the Document Workflow
//!
//! SQLite persistence for quotations, orders, invoices, payments, the
//! product catalog, stock and the accounting ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Document Workflow Data Flow                      │
//! │                                                                         │
//! │  WorkflowService::convert_order_to_invoice (docflow-engine)            │
//! │       │  one transaction                                                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     docflow-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌──────────────┐  ┌──────────────────────┐  │   │
//! │  │   │  Database   │  │ Repositories │  │ Ledgers              │  │   │
//! │  │   │  (pool.rs)  │  │ quotation    │  │ inventory.rs         │  │   │
//! │  │   │             │  │ order        │  │  deduct_stock        │  │   │
//! │  │   │ SqlitePool  │◄─│ invoice      │  │ accounting.rs        │  │   │
//! │  │   │ migrations  │  │ payment ...  │  │  record_movement     │  │   │
//! │  │   └─────────────┘  └──────────────┘  └──────────────────────┘  │   │
//! │  │                    sequence.rs: FACT-YYYYMMDD-NNNN counters     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Aggregate repositories
//! - [`sequence`] - Daily document number counters
//! - [`inventory`] - Stock availability, deduction, low-stock scan
//! - [`accounting`] - Append-only ledger, summaries, period close
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docflow_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/docflow.db")).await?;
//! let invoice = db.invoices().find_by_number("FACT-20240315-0001").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounting;
pub mod error;
pub mod inventory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequence;

// =============================================================================
// Re-exports
// =============================================================================

pub use accounting::{AccountingLedger, DateRange, LedgerSummary, NewMovement};
pub use error::{DbError, DbResult, StockError};
pub use inventory::InventoryLedger;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::client::ClientRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
pub use repository::quotation::QuotationRepository;
pub use repository::salesperson::SalespersonRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use docflow_core::{Client, InventoryItem, ProductVariant, Role, Salesperson};

    use crate::{Database, DbConfig};

    /// In-memory database with one client ("0912345678") and one
    /// salesperson ("u-1").
    pub async fn seeded_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        db.clients()
            .insert(&Client {
                id: "0912345678".to_string(),
                name: "Central".to_string(),
                email: None,
                phone: None,
                address: None,
                wholesale: true,
                credit_limit_cents: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        db.salespeople()
            .insert(&Salesperson {
                id: "u-1".to_string(),
                name: "Ana".to_string(),
                role: Role::Salesperson,
                is_active: true,
            })
            .await
            .unwrap();

        db
    }

    pub async fn seed_product(db: &Database, code: &str, stock: i64) -> InventoryItem {
        let now = Utc::now();
        let item = InventoryItem {
            code: code.to_string(),
            description: format!("{code} item"),
            unit_price_cents: 1000,
            stock,
            serial_number: None,
            is_active: true,
            variant: ProductVariant::OfficeSupply {
                brand: None,
                pack_size: None,
            },
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&item).await.unwrap();
        item
    }
}
