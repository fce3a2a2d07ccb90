//! # Payment Processor
//!
//! Settles invoices by cash, card, bank transfer or check.
//!
//! ## Approval Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payment Approval                                 │
//! │                                                                         │
//! │  CASH ───────── tendered >= total ──► APPROVED ─┐                       │
//! │                                                 │                       │
//! │  CARD ──┬─ auth code, total <= limit ► APPROVED ┤                       │
//! │         └─ otherwise ────────────────► DECLINED │ (row kept for audit)  │
//! │                                                 │                       │
//! │  TRANSFER / CHECK ──► PENDING ──approve()───────┤                       │
//! │                          └──────reject()──► REJECTED                    │
//! │                                                 ▼                       │
//! │                             invoice.paid = 1, DEBIT PAYMENT movement    │
//! │                                                                         │
//! │  invoice.paid is set in the same transaction that approves a payment,  │
//! │  so paid ⇔ at least one approved payment.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use docflow_core::validation::{validate_card_last_four, validate_name, validate_reason};
use docflow_core::{
    Direction, Invoice, Money, MovementDocType, Payment, PaymentMethod, PaymentStatus,
    ValidationError,
};
use docflow_db::repository::invoice::InvoiceRepository;
use docflow_db::repository::payment::PaymentRepository;
use docflow_db::{AccountingLedger, Database, NewMovement};

use crate::config::EngineConfig;
use crate::context::WorkflowContext;
use crate::error::{within, ConflictReason, WorkflowError, WorkflowResult};

// =============================================================================
// Requests and Outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Credit,
    Debit,
}

impl CardKind {
    pub const fn method(&self) -> PaymentMethod {
        match self {
            CardKind::Credit => PaymentMethod::CardCredit,
            CardKind::Debit => PaymentMethod::CardDebit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayment {
    pub kind: CardKind,
    pub last_four: String,
    /// Blank means the terminal returned no authorization.
    pub auth_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashReceipt {
    pub payment: Payment,
    pub change: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardOutcome {
    pub payment: Payment,
    pub approved: bool,
    pub decline_reason: Option<String>,
}

impl CardOutcome {
    /// The approved payment, or `PaymentDeclined`.
    pub fn into_approved(self) -> WorkflowResult<Payment> {
        if self.approved {
            Ok(self.payment)
        } else {
            Err(WorkflowError::PaymentDeclined {
                reason: self
                    .decline_reason
                    .unwrap_or_else(|| "declined".to_string()),
            })
        }
    }
}

// =============================================================================
// Payment Processor
// =============================================================================

#[derive(Debug, Clone)]
pub struct PaymentProcessor {
    db: Database,
    config: Arc<EngineConfig>,
}

impl PaymentProcessor {
    pub fn new(db: Database, config: Arc<EngineConfig>) -> Self {
        PaymentProcessor { db, config }
    }

    /// Pays the full invoice total in cash.
    ///
    /// ## Errors
    /// - `Validation(InsufficientTender)` if `tendered` is below the total
    /// - `Conflict(AlreadyPaid | AlreadyAnnulled)`
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id, tendered = tendered.cents()))]
    pub async fn process_cash(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        tendered: Money,
    ) -> WorkflowResult<CashReceipt> {
        let actor = ctx.actor.id.clone();

        let receipt = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let invoice = load_payable(&mut tx, invoice_id).await?;

            let total = invoice.total();
            if tendered < total {
                return Err(ValidationError::InsufficientTender {
                    tendered: tendered.cents(),
                    total: total.cents(),
                }
                .into());
            }
            let change = tendered - total;

            let now = Utc::now();
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                amount_cents: total.cents(),
                method: PaymentMethod::Cash,
                reference: None,
                approved: true,
                status: PaymentStatus::Approved,
                observations: None,
                tendered_cents: Some(tendered.cents()),
                change_cents: Some(change.cents()),
                bank: None,
                card_last_four: None,
                created_at: now,
                settled_at: Some(now),
            };

            PaymentRepository::insert(&mut tx, &payment).await?;
            settle_invoice(&mut tx, &invoice, &payment, &actor).await?;

            tx.commit().await?;
            Ok::<_, WorkflowError>(CashReceipt { payment, change })
        })
        .await?;

        info!(
            payment = %receipt.payment.id,
            invoice = %invoice_id,
            change = receipt.change.cents(),
            "Cash payment approved"
        );
        Ok(receipt)
    }

    /// Simulated card authorization.
    ///
    /// Declined when the auth code is blank or the total is above the
    /// configured card limit. A declined attempt is still stored (status
    /// `Declined`) and returned with `approved = false`.
    #[instrument(skip(self, ctx, card), fields(actor = %ctx.actor.id, kind = ?card.kind))]
    pub async fn process_card(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        card: CardPayment,
    ) -> WorkflowResult<CardOutcome> {
        validate_card_last_four(&card.last_four)?;

        let actor = ctx.actor.id.clone();
        let limit = self.config.card_approval_limit();
        let auth_code = card.auth_code.trim().to_string();

        let outcome = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let invoice = load_payable(&mut tx, invoice_id).await?;

            let total = invoice.total();
            let decline_reason = if auth_code.is_empty() {
                Some("missing authorization code".to_string())
            } else if total > limit {
                Some(format!("amount {} exceeds card limit {}", total, limit))
            } else {
                None
            };
            let approved = decline_reason.is_none();

            let now = Utc::now();
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                amount_cents: total.cents(),
                method: card.kind.method(),
                reference: (!auth_code.is_empty()).then(|| auth_code.clone()),
                approved,
                status: if approved {
                    PaymentStatus::Approved
                } else {
                    PaymentStatus::Declined
                },
                observations: decline_reason.clone(),
                tendered_cents: None,
                change_cents: None,
                bank: None,
                card_last_four: Some(card.last_four.clone()),
                created_at: now,
                settled_at: Some(now),
            };

            PaymentRepository::insert(&mut tx, &payment).await?;
            if approved {
                settle_invoice(&mut tx, &invoice, &payment, &actor).await?;
            }

            tx.commit().await?;
            Ok::<_, WorkflowError>(CardOutcome {
                payment,
                approved,
                decline_reason,
            })
        })
        .await?;

        match &outcome.decline_reason {
            None => info!(payment = %outcome.payment.id, invoice = %invoice_id, "Card payment approved"),
            Some(reason) => warn!(
                payment = %outcome.payment.id,
                invoice = %invoice_id,
                reason = %reason,
                "Card payment declined"
            ),
        }
        Ok(outcome)
    }

    /// Registers a bank transfer. The invoice stays unpaid until [`approve`](Self::approve).
    pub async fn process_transfer(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        reference: &str,
        bank: &str,
    ) -> WorkflowResult<Payment> {
        self.register_pending(ctx, invoice_id, PaymentMethod::Transfer, reference, bank)
            .await
    }

    /// Registers a check. Same approval path as a transfer.
    pub async fn process_check(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        check_number: &str,
        bank: &str,
    ) -> WorkflowResult<Payment> {
        self.register_pending(ctx, invoice_id, PaymentMethod::Check, check_number, bank)
            .await
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    async fn register_pending(
        &self,
        ctx: &WorkflowContext,
        invoice_id: &str,
        method: PaymentMethod,
        reference: &str,
        bank: &str,
    ) -> WorkflowResult<Payment> {
        let reference = validate_reason("reference", reference)?;
        validate_name("bank", bank)?;
        let bank = bank.trim().to_string();

        let payment = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let invoice = load_payable(&mut tx, invoice_id).await?;

            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                amount_cents: invoice.totals.total_cents,
                method,
                reference: Some(reference),
                approved: false,
                status: PaymentStatus::Pending,
                observations: None,
                tendered_cents: None,
                change_cents: None,
                bank: Some(bank),
                card_last_four: None,
                created_at: Utc::now(),
                settled_at: None,
            };

            PaymentRepository::insert(&mut tx, &payment).await?;
            tx.commit().await?;
            Ok::<_, WorkflowError>(payment)
        })
        .await?;

        info!(payment = %payment.id, invoice = %invoice_id, ?method, "Payment pending approval");
        Ok(payment)
    }

    /// Approves a pending payment and marks its invoice paid.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown payment id
    /// - `Conflict(PaymentNotPending)` if already approved, rejected or declined
    /// - `Conflict(AlreadyPaid | AlreadyAnnulled)` from the invoice; the
    ///   payment stays pending
    #[instrument(skip(self, ctx), fields(actor = %ctx.actor.id))]
    pub async fn approve(&self, ctx: &WorkflowContext, payment_id: &str) -> WorkflowResult<Payment> {
        let actor = ctx.actor.id.clone();

        let payment = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let payment = claim_pending(&mut tx, payment_id, PaymentStatus::Approved, None).await?;

            let invoice = InvoiceRepository::fetch(&mut tx, &payment.invoice_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found("Invoice", &payment.invoice_id))?;
            if invoice.annulled {
                return Err(ConflictReason::AlreadyAnnulled.into());
            }

            settle_invoice(&mut tx, &invoice, &payment, &actor).await?;

            tx.commit().await?;
            Ok::<_, WorkflowError>(payment)
        })
        .await?;

        info!(payment = %payment.id, invoice = %payment.invoice_id, "Payment approved");
        Ok(payment)
    }

    /// Rejects a pending payment. The invoice is left untouched.
    #[instrument(skip(self, ctx, reason), fields(actor = %ctx.actor.id))]
    pub async fn reject(
        &self,
        ctx: &WorkflowContext,
        payment_id: &str,
        reason: &str,
    ) -> WorkflowResult<Payment> {
        let reason = validate_reason("reason", reason)?;

        let payment = within(self.config.transaction_timeout(), async {
            let mut tx = self.db.pool().begin().await?;
            let payment =
                claim_pending(&mut tx, payment_id, PaymentStatus::Rejected, Some(&reason)).await?;
            tx.commit().await?;
            Ok::<_, WorkflowError>(payment)
        })
        .await?;

        info!(payment = %payment.id, reason = %reason, "Payment rejected");
        Ok(payment)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn payments_for_invoice(&self, invoice_id: &str) -> WorkflowResult<Vec<Payment>> {
        Ok(self.db.payments().find_by_invoice(invoice_id).await?)
    }

    /// Transfers and checks waiting for a decision, oldest first.
    pub async fn pending(&self) -> WorkflowResult<Vec<Payment>> {
        Ok(self.db.payments().list_pending().await?)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Loads an invoice that can still take a payment.
async fn load_payable(conn: &mut SqliteConnection, invoice_id: &str) -> WorkflowResult<Invoice> {
    let invoice = InvoiceRepository::fetch(conn, invoice_id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Invoice", invoice_id))?;

    if invoice.annulled {
        return Err(ConflictReason::AlreadyAnnulled.into());
    }
    if invoice.paid {
        return Err(ConflictReason::AlreadyPaid.into());
    }

    Ok(invoice)
}

/// Moves a pending payment to `status` and returns the updated row.
async fn claim_pending(
    conn: &mut SqliteConnection,
    payment_id: &str,
    status: PaymentStatus,
    observations: Option<&str>,
) -> WorkflowResult<Payment> {
    let now = Utc::now();

    if !PaymentRepository::settle(conn, payment_id, status, observations, now).await? {
        return Err(match PaymentRepository::fetch(conn, payment_id).await? {
            None => WorkflowError::not_found("Payment", payment_id),
            Some(_) => ConflictReason::PaymentNotPending.into(),
        });
    }

    PaymentRepository::fetch(conn, payment_id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Payment", payment_id))
}

/// Marks the invoice paid and posts the DEBIT payment movement.
///
/// `payment` must already be stored as approved. The invoice is paid only if
/// it is the one approved payment on record.
async fn settle_invoice(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
    payment: &Payment,
    actor: &str,
) -> WorkflowResult<()> {
    let at = payment.settled_at.unwrap_or_else(Utc::now);

    if !InvoiceRepository::mark_paid(conn, &invoice.id, payment.method, at).await? {
        return Err(ConflictReason::AlreadyPaid.into());
    }

    let approved = PaymentRepository::count_approved(conn, &invoice.id).await?;
    if approved != 1 {
        warn!(
            invoice = %invoice.number,
            approved,
            "Unpaid invoice already had an approved payment"
        );
        return Err(ConflictReason::AlreadyPaid.into());
    }

    AccountingLedger::record_movement(
        conn,
        &NewMovement {
            document_type: MovementDocType::Payment,
            document_number: invoice.number.clone(),
            description: format!("Payment of invoice {} ({:?})", invoice.number, payment.method),
            amount: payment.amount(),
            direction: Direction::Debit,
            actor: actor.to_string(),
            counterparty: Some(invoice.client_id.clone()),
            detail: Some(payment.id.clone()),
        },
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declined(reason: Option<&str>) -> CardOutcome {
        let now = Utc::now();
        CardOutcome {
            payment: Payment {
                id: "p-1".to_string(),
                invoice_id: "i-1".to_string(),
                amount_cents: 2204,
                method: PaymentMethod::CardCredit,
                reference: None,
                approved: false,
                status: PaymentStatus::Declined,
                observations: reason.map(str::to_string),
                tendered_cents: None,
                change_cents: None,
                bank: None,
                card_last_four: Some("4242".to_string()),
                created_at: now,
                settled_at: Some(now),
            },
            approved: false,
            decline_reason: reason.map(str::to_string),
        }
    }

    #[test]
    fn test_card_kind_maps_to_method() {
        assert_eq!(CardKind::Credit.method(), PaymentMethod::CardCredit);
        assert_eq!(CardKind::Debit.method(), PaymentMethod::CardDebit);
        assert!(CardKind::Debit.method().settles_immediately());
    }

    #[test]
    fn test_declined_outcome_is_an_error() {
        match declined(Some("missing authorization code")).into_approved() {
            Err(WorkflowError::PaymentDeclined { reason }) => {
                assert_eq!(reason, "missing authorization code")
            }
            other => panic!("expected PaymentDeclined, got {other:?}"),
        }
    }

    #[test]
    fn test_approved_outcome_yields_payment() {
        let mut outcome = declined(None);
        outcome.approved = true;
        outcome.payment.status = PaymentStatus::Approved;

        let payment = outcome.into_approved().unwrap();
        assert_eq!(payment.id, "p-1");
    }
}
