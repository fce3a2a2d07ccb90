//! # Document Workflow Service
//!
//! Legal transitions between quotations, orders and invoices.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Document Lifecycle                              │
//! │                                                                         │
//! │  create_quotation        convert_quotation_to_order                     │
//! │  ────────────────        ──────────────────────────                     │
//! │  COT-YYYYMMDD-NNNN ────► ORD-YYYYMMDD-NNNN                              │
//! │  CREDIT QUOTATION        converted = 1 (once)                           │
//! │                                   │                                     │
//! │                                   │ convert_order_to_invoice            │
//! │                                   ▼                                     │
//! │                          FACT-YYYYMMDD-NNNN                             │
//! │                          invoiced = 1 (once), stock deducted            │
//! │                          DEBIT SALE, CREDIT COST_OF_GOODS               │
//! │                                   │                                     │
//! │                 ┌─────────────────┴──────────────┐                      │
//! │                 ▼                                ▼                      │
//! │            annul_invoice                   PaymentProcessor             │
//! │            CREDIT ANNULMENT                paid = 1                     │
//! │                                                                         │
//! │  Each arrow is ONE transaction, bounded by the configured timeout.     │
//! │  Flags flip through guarded UPDATEs (… WHERE flag = 0): the loser of   │
//! │  a race sees 0 rows affected and gets a Conflict.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use docflow_core::totals::{compute_totals, cost_of_goods};
use docflow_core::validation::{
    validate_discount, validate_line_against_item, validate_line_count, validate_product_code,
    validate_quantity, validate_reason,
};
use docflow_core::{
    Client, Direction, DiscountRate, DocumentKind, Hydrated, Invoice, LineItem, MovementDocType,
    Order, Quotation, Salesperson, ValidationError,
};
use docflow_db::repository::invoice::InvoiceRepository;
use docflow_db::repository::order::OrderRepository;
use docflow_db::repository::quotation::QuotationRepository;
use docflow_db::sequence::next_number;
use docflow_db::{AccountingLedger, Database, InventoryLedger, NewMovement};

use crate::config::EngineConfig;
use crate::context::WorkflowContext;
use crate::error::{within, ConflictReason, WorkflowError, WorkflowResult};

// =============================================================================
// Requests
// =============================================================================

/// One requested line: the price comes from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub product_code: String,
    pub quantity: i64,
}

impl QuotationLine {
    pub fn new(product_code: impl Into<String>, quantity: i64) -> Self {
        QuotationLine {
            product_code: product_code.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuotation {
    pub client_id: String,
    pub salesperson_id: String,
    pub lines: Vec<QuotationLine>,
    /// On top of the automatic wholesale discount.
    #[serde(default)]
    pub manual_discount: DiscountRate,
}

// =============================================================================
// Workflow Service
// =============================================================================

/// Orchestrates document conversions over one database.
///
/// Cheap to clone; clones share the pool and configuration.
#[derive(Debug, Clone)]
pub struct WorkflowService {
    db: Database,
    config: Arc<EngineConfig>,
}

impl WorkflowService {
    pub fn new(db: Database, config: Arc<EngineConfig>) -> Self {
        WorkflowService { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Quotation
    // =========================================================================

    /// Prices the requested lines and records a new quotation.
    ///
    /// ## Errors
    /// - `Validation`: empty request, bad quantity or discount, unknown or
    ///   inactive client / salesperson / product, serialized product with
    ///   quantity > 1, quantity above current stock
    ///
    /// The stock check is advisory: nothing is reserved.
    #[instrument(skip(self, ctx, request), fields(client = %request.client_id, actor = %ctx.actor.id))]
    pub async fn create_quotation(
        &self,
        ctx: &WorkflowContext,
        request: CreateQuotation,
    ) -> WorkflowResult<Quotation> {
        validate_line_count(request.lines.len())?;
        validate_discount(request.manual_discount)?;

        let mut seen = HashSet::new();
        for line in &request.lines {
            validate_product_code(&line.product_code)?;
            validate_quantity(line.quantity)?;
            if !seen.insert(line.product_code.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "product_code".to_string(),
                    value: line.product_code.clone(),
                }
                .into());
            }
        }

        let client = self.active_client(&request.client_id).await?;
        let salesperson = self.active_salesperson(&request.salesperson_id).await?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for (idx, requested) in request.lines.iter().enumerate() {
            let item = self
                .db
                .products()
                .find_by_code(&requested.product_code)
                .await?
                .filter(|item| item.is_active)
                .ok_or_else(|| ValidationError::unknown("product_code", &requested.product_code))?;

            validate_line_against_item(&item, requested.quantity)?;
            lines.push(LineItem::snapshot(idx as i64 + 1, &item, requested.quantity));
        }

        let totals = compute_totals(
            &lines,
            client.wholesale,
            request.manual_discount,
            &self.config.pricing(),
        )?;

        let now = Utc::now();
        let actor = ctx.actor.id.clone();

        let quotation = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;

            let number = next_number(&mut tx, DocumentKind::Quotation, now.date_naive()).await?;
            let quotation = Quotation {
                id: Uuid::new_v4().to_string(),
                number: number.to_string(),
                client_id: client.id.clone(),
                salesperson_id: salesperson.id.clone(),
                created_at: now,
                lines,
                totals,
                converted: false,
            };

            QuotationRepository::insert(&mut tx, &quotation).await?;
            AccountingLedger::record_movement(
                &mut tx,
                &NewMovement {
                    document_type: MovementDocType::Quotation,
                    document_number: quotation.number.clone(),
                    description: format!("Quotation {} for {}", quotation.number, client.name),
                    amount: quotation.totals.total(),
                    direction: Direction::Credit,
                    actor,
                    counterparty: Some(client.id.clone()),
                    detail: None,
                },
            )
            .await?;

            tx.commit().await?;
            Ok::<_, WorkflowError>(quotation)
        })
        .await?;

        info!(
            id = %quotation.id,
            number = %quotation.number,
            total = quotation.totals.total_cents,
            lines = quotation.lines.len(),
            "Quotation created"
        );
        Ok(quotation)
    }

    // =========================================================================
    // Quotation → Order
    // =========================================================================

    /// Converts a quotation into an order, at most once.
    ///
    /// Lines and totals are copied verbatim; no stock or ledger effect.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn convert_quotation_to_order(
        &self,
        ctx: &WorkflowContext,
        quotation_id: &str,
    ) -> WorkflowResult<Order> {
        let order = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;

            if !QuotationRepository::mark_converted(&mut tx, quotation_id).await? {
                return Err(match QuotationRepository::fetch(&mut tx, quotation_id).await? {
                    None => WorkflowError::not_found("Quotation", quotation_id),
                    Some(_) => ConflictReason::AlreadyConverted.into(),
                });
            }

            let quotation = QuotationRepository::fetch(&mut tx, quotation_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("Quotation", quotation_id))?;

            let now = Utc::now();
            let number = next_number(&mut tx, DocumentKind::Order, now.date_naive()).await?;
            let order = Order {
                id: Uuid::new_v4().to_string(),
                number: number.to_string(),
                client_id: quotation.client_id.clone(),
                salesperson_id: quotation.salesperson_id.clone(),
                created_at: now,
                quotation_id: Some(quotation.id.clone()),
                lines: quotation.lines.iter().map(LineItem::copy_for_conversion).collect(),
                totals: quotation.totals,
                invoiced: false,
                invoice_id: None,
            };

            OrderRepository::insert(&mut tx, &order).await?;
            tx.commit().await?;

            debug!(quotation = %quotation.number, "Quotation marked converted");
            Ok::<_, WorkflowError>(order)
        })
        .await?;

        info!(id = %order.id, number = %order.number, "Order created from quotation");
        Ok(order)
    }

    // =========================================================================
    // Order → Invoice
    // =========================================================================

    /// Invoices an order, at most once, deducting stock for every line.
    ///
    /// All-or-nothing: if any line lacks stock the invoice, the number, the
    /// claim on the order and every earlier deduction roll back together.
    ///
    /// After commit a low-stock scan is queued for the alert worker. The
    /// scan runs there and never delays or fails the call.
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn convert_order_to_invoice(
        &self,
        ctx: &WorkflowContext,
        order_id: &str,
    ) -> WorkflowResult<Invoice> {
        let actor = ctx.actor.id.clone();
        let cost_bps = self.config.pricing.cost_of_goods_bps;

        let invoice = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;

            if !OrderRepository::claim_for_invoicing(&mut tx, order_id).await? {
                return Err(match OrderRepository::fetch(&mut tx, order_id).await? {
                    None => WorkflowError::not_found("Order", order_id),
                    Some(_) => ConflictReason::AlreadyInvoiced.into(),
                });
            }

            let order = OrderRepository::fetch(&mut tx, order_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("Order", order_id))?;

            let now = Utc::now();
            let number = next_number(&mut tx, DocumentKind::Invoice, now.date_naive()).await?;
            let invoice = Invoice {
                id: Uuid::new_v4().to_string(),
                number: number.to_string(),
                client_id: order.client_id.clone(),
                salesperson_id: order.salesperson_id.clone(),
                created_at: now,
                order_id: Some(order.id.clone()),
                lines: order.lines.iter().map(LineItem::copy_for_conversion).collect(),
                totals: order.totals,
                annulled: false,
                annulment_reason: None,
                annulled_at: None,
                paid: false,
                payment_method: None,
                paid_at: None,
            };

            InvoiceRepository::insert(&mut tx, &invoice).await?;

            for line in &invoice.lines {
                InventoryLedger::deduct_stock(&mut tx, &line.product_code, line.quantity).await?;
            }

            OrderRepository::set_invoice(&mut tx, &order.id, &invoice.id).await?;
            post_sale(&mut tx, &invoice, &order.number, &actor, cost_bps).await?;

            tx.commit().await?;
            Ok::<_, WorkflowError>(invoice)
        })
        .await?;

        info!(
            id = %invoice.id,
            number = %invoice.number,
            total = invoice.totals.total_cents,
            "Invoice created from order"
        );

        ctx.alerts
            .request_scan(&invoice.number, self.config.inventory.low_stock_threshold);
        Ok(invoice)
    }

    // =========================================================================
    // Annulment
    // =========================================================================

    /// Annuls an invoice and posts a reversing CREDIT for its total.
    ///
    /// Stock is not returned; the original SALE movement stays as posted.
    #[instrument(skip(self, ctx, reason), fields(actor = %ctx.actor.id))]
    pub async fn annul_invoice(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        reason: &str,
    ) -> WorkflowResult<Invoice> {
        let reason = validate_reason("reason", reason)?;
        let actor = ctx.actor.id.clone();

        let invoice = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let now = Utc::now();

            if !InvoiceRepository::mark_annulled(&mut tx, invoice_id, &reason, now).await? {
                return Err(match InvoiceRepository::fetch(&mut tx, invoice_id).await? {
                    None => WorkflowError::not_found("Invoice", invoice_id),
                    Some(_) => ConflictReason::AlreadyAnnulled.into(),
                });
            }

            let invoice = InvoiceRepository::fetch(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("Invoice", invoice_id))?;

            AccountingLedger::record_movement(
                &mut tx,
                &NewMovement {
                    document_type: MovementDocType::Annulment,
                    document_number: invoice.number.clone(),
                    description: format!("Annulment of invoice {}", invoice.number),
                    amount: invoice.totals.total(),
                    direction: Direction::Credit,
                    actor,
                    counterparty: Some(invoice.client_id.clone()),
                    detail: Some(reason.clone()),
                },
            )
            .await?;

            tx.commit().await?;
            Ok::<_, WorkflowError>(invoice)
        })
        .await?;

        info!(
            id = %invoice.id,
            number = %invoice.number,
            paid = invoice.paid,
            "Invoice annulled"
        );
        Ok(invoice)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Quotation with client, salesperson and line products resolved.
    pub async fn quotation(&self, id: &str) -> WorkflowResult<Hydrated<Quotation>> {
        self.db
            .quotations()
            .hydrated(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Quotation", id))
    }

    pub async fn order(&self, id: &str) -> WorkflowResult<Hydrated<Order>> {
        self.db
            .orders()
            .hydrated(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Order", id))
    }

    pub async fn invoice(&self, id: &str) -> WorkflowResult<Hydrated<Invoice>> {
        self.db
            .invoices()
            .hydrated(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Invoice", id))
    }

    /// Invoices created in `[from, to)`, optionally for one salesperson.
    pub async fn invoices_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        salesperson_id: Option<&str>,
    ) -> WorkflowResult<Vec<Invoice>> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "range".to_string(),
                reason: format!("start {from} is after end {to}"),
            }
            .into());
        }

        Ok(self.db.invoices().find_between(from, to, salesperson_id).await?)
    }

    // =========================================================================
    // Reference Checks
    // =========================================================================

    async fn active_client(&self, id: &str) -> WorkflowResult<Client> {
        self.db
            .clients()
            .find_by_id(id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| ValidationError::unknown("client_id", id).into())
    }

    async fn active_salesperson(&self, id: &str) -> WorkflowResult<Salesperson> {
        self.db
            .salespeople()
            .find_by_id(id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| ValidationError::unknown("salesperson_id", id).into())
    }
}

/// Posts the sale (DEBIT, total) and the estimated cost of goods (CREDIT).
async fn post_sale(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
    order_number: &str,
    actor: &str,
    cost_bps: u32,
) -> WorkflowResult<()> {
    AccountingLedger::record_movement(
        conn,
        &NewMovement {
            document_type: MovementDocType::Sale,
            document_number: invoice.number.clone(),
            description: format!("Sale {} from order {}", invoice.number, order_number),
            amount: invoice.totals.total(),
            direction: Direction::Debit,
            actor: actor.to_string(),
            counterparty: Some(invoice.client_id.clone()),
            detail: None,
        },
    )
    .await?;

    AccountingLedger::record_movement(
        conn,
        &NewMovement {
            document_type: MovementDocType::CostOfGoods,
            document_number: invoice.number.clone(),
            description: format!("Cost of goods for {}", invoice.number),
            amount: cost_of_goods(&invoice.lines, cost_bps),
            direction: Direction::Credit,
            actor: actor.to_string(),
            counterparty: None,
            detail: Some(format!("{} bps of sale price", cost_bps)),
        },
    )
    .await?;

    Ok(())
}
