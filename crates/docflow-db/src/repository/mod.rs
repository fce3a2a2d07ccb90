//! # Repository Module
//!
//! Persistence adapters for the workflow aggregates.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two ways into every repository                       │
//! │                                                                         │
//! │  Standalone reads (own pooled connection)                              │
//! │       db.invoices().find_by_number("FACT-20240315-0001")               │
//! │                                                                         │
//! │  Inside a workflow transaction (caller's connection)                   │
//! │       let mut tx = db.pool().begin().await?;                           │
//! │       InvoiceRepository::insert(&mut tx, &invoice).await?;             │
//! │       InvoiceRepository::mark_paid(&mut tx, id, method, now).await?;   │
//! │       tx.commit().await?;                                              │
//! │                                                                         │
//! │  Status changes are guarded UPDATEs (`... AND paid = 0`) that report   │
//! │  whether they won; callers turn a lost race into a conflict.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`client::ClientRepository`] - Client directory
//! - [`salesperson::SalespersonRepository`] - User directory (read-only for the workflow)
//! - [`product::ProductRepository`] - Catalog with category variants
//! - [`quotation::QuotationRepository`] - Quotations and their lines
//! - [`order::OrderRepository`] - Orders and their lines
//! - [`invoice::InvoiceRepository`] - Invoices and their lines
//! - [`payment::PaymentRepository`] - Payment attempts

use std::collections::BTreeMap;

use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};
use docflow_core::{Hydrated, Invoice, LineItem, Order, Quotation};

pub mod client;
pub(crate) mod lines;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod product;
pub mod quotation;
pub mod salesperson;

/// A document that refers to a client, a salesperson and catalog items.
pub(crate) trait DocumentRefs {
    fn client_id(&self) -> &str;
    fn salesperson_id(&self) -> &str;
    fn lines(&self) -> &[LineItem];
}

macro_rules! document_refs {
    ($($doc:ty),*) => {$(
        impl DocumentRefs for $doc {
            fn client_id(&self) -> &str {
                &self.client_id
            }
            fn salesperson_id(&self) -> &str {
                &self.salesperson_id
            }
            fn lines(&self) -> &[LineItem] {
                &self.lines
            }
        }
    )*};
}

document_refs!(Quotation, Order, Invoice);

/// Resolves the client, salesperson and every product a document refers to.
pub(crate) async fn hydrate<D: DocumentRefs>(
    conn: &mut SqliteConnection,
    document: D,
) -> DbResult<Hydrated<D>> {
    let client_id = document.client_id();
    let client = client::ClientRepository::fetch(conn, client_id)
        .await?
        .ok_or_else(|| DbError::not_found("Client", client_id))?;

    let salesperson_id = document.salesperson_id();
    let salesperson = salesperson::SalespersonRepository::fetch(conn, salesperson_id)
        .await?
        .ok_or_else(|| DbError::not_found("Salesperson", salesperson_id))?;

    let mut products = BTreeMap::new();
    for line in document.lines() {
        if products.contains_key(&line.product_code) {
            continue;
        }
        let item = product::ProductRepository::fetch(conn, &line.product_code)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &line.product_code))?;
        products.insert(line.product_code.clone(), item);
    }

    Ok(Hydrated {
        document,
        client,
        salesperson,
        products,
    })
}
