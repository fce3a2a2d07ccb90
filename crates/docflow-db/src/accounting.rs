//! # Accounting Ledger
//!
//! Append-only record of the money side of every workflow step.
//!
//! ## Movements Posted by the Workflow
//! ```text
//! ┌──────────────────────┬───────────────┬───────────┬───────────────────┐
//! │ Event                │ Document type │ Direction │ Amount            │
//! ├──────────────────────┼───────────────┼───────────┼───────────────────┤
//! │ Quotation created    │ QUOTATION     │ CREDIT    │ quotation total   │
//! │ Invoice created      │ SALE          │ DEBIT     │ invoice total     │
//! │ Invoice created      │ COST_OF_GOODS │ CREDIT    │ Σ cost per line   │
//! │ Invoice annulled     │ ANNULMENT     │ CREDIT    │ invoice total     │
//! │ Payment approved     │ PAYMENT       │ DEBIT     │ payment amount    │
//! │ Period closed        │ PERIOD_CLOSE  │ by sign   │ |balance|         │
//! └──────────────────────┴───────────────┴───────────┴───────────────────┘
//! ```
//!
//! There is no update or delete API; the schema also rejects both with
//! triggers. Corrections are new, reversing movements.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use docflow_core::{AccountingMovement, Direction, Money, MovementDocType};

const MOVEMENT_SELECT: &str = r#"
    SELECT id, created_at, document_type, document_number, description,
           amount_cents, direction, actor, counterparty, detail
    FROM movimientos_contables
"#;

// =============================================================================
// Types
// =============================================================================

/// A movement about to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub document_type: MovementDocType,
    pub document_number: String,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    pub actor: String,
    pub counterparty: Option<String>,
    pub detail: Option<String>,
}

/// Half-open time range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange { from, to }
    }

    /// The whole UTC day `date`.
    pub fn day(date: NaiveDate) -> Self {
        DateRange {
            from: start_of_day(date),
            to: start_of_day(next_day(date)),
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// Debit/credit totals over a range.
///
/// `PERIOD_CLOSE` markers appear in `count_by_doc_type` but not in the
/// totals, so closing a period never changes the balance it reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_debits: Money,
    pub total_credits: Money,
    /// `total_debits - total_credits`.
    pub balance: Money,
    pub count_by_doc_type: BTreeMap<MovementDocType, i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    document_type: MovementDocType,
    direction: Direction,
    movements: i64,
    amount_cents: i64,
}

// =============================================================================
// Ledger
// =============================================================================

/// The accounting ledger.
#[derive(Debug, Clone)]
pub struct AccountingLedger {
    pool: SqlitePool,
}

impl AccountingLedger {
    pub fn new(pool: SqlitePool) -> Self {
        AccountingLedger { pool }
    }

    /// Appends a movement on the caller's transaction.
    ///
    /// ## Returns
    /// The new movement id.
    pub async fn record_movement(
        conn: &mut SqliteConnection,
        movement: &NewMovement,
    ) -> DbResult<String> {
        if movement.amount.is_negative() {
            return Err(DbError::CheckViolation(format!(
                "movement amount must be non-negative, got {}",
                movement.amount
            )));
        }

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO movimientos_contables (
                id, created_at, document_type, document_number, description,
                amount_cents, direction, actor, counterparty, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&id)
        .bind(Utc::now())
        .bind(movement.document_type)
        .bind(&movement.document_number)
        .bind(&movement.description)
        .bind(movement.amount.cents())
        .bind(movement.direction)
        .bind(&movement.actor)
        .bind(&movement.counterparty)
        .bind(&movement.detail)
        .execute(&mut *conn)
        .await?;

        debug!(
            id = %id,
            doc_type = ?movement.document_type,
            number = %movement.document_number,
            amount = movement.amount.cents(),
            direction = ?movement.direction,
            "Movement recorded"
        );
        Ok(id)
    }

    /// Appends a movement outside any workflow transaction.
    pub async fn record(&self, movement: &NewMovement) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        Self::record_movement(&mut conn, movement).await
    }

    /// Totals for `range`, or for the whole ledger when `None`.
    pub async fn summarize(&self, range: Option<DateRange>) -> DbResult<LedgerSummary> {
        let (from, to) = match range {
            Some(r) => (Some(r.from), Some(r.to)),
            None => (None, None),
        };
        self.summarize_bounds(from, to).await
    }

    async fn summarize_bounds(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<LedgerSummary> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT document_type,
                   direction,
                   COUNT(*) AS movements,
                   COALESCE(SUM(amount_cents), 0) AS amount_cents
            FROM movimientos_contables
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
            GROUP BY document_type, direction
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = LedgerSummary::default();
        for row in rows {
            *summary.count_by_doc_type.entry(row.document_type).or_insert(0) += row.movements;

            if row.document_type == MovementDocType::PeriodClose {
                continue;
            }
            match row.direction {
                Direction::Debit => summary.total_debits += Money::from_cents(row.amount_cents),
                Direction::Credit => summary.total_credits += Money::from_cents(row.amount_cents),
            }
        }
        summary.balance = summary.total_debits - summary.total_credits;

        Ok(summary)
    }

    /// Posts a `PERIOD_CLOSE` marker carrying the balance through the end of
    /// `date` (UTC).
    ///
    /// Amount is `|balance|`; direction is DEBIT for a balance ≥ 0, CREDIT
    /// otherwise. The period is not locked: later postings are still accepted.
    pub async fn period_close(
        &self,
        date: NaiveDate,
        notes: Option<&str>,
        actor: &str,
    ) -> DbResult<String> {
        let through = start_of_day(next_day(date));
        let summary = self.summarize_bounds(None, Some(through)).await?;

        let direction = if summary.balance.is_negative() {
            Direction::Credit
        } else {
            Direction::Debit
        };

        let movement = NewMovement {
            document_type: MovementDocType::PeriodClose,
            document_number: format!("CLOSE-{}", date.format("%Y%m%d")),
            description: format!("Period close through {date}"),
            amount: summary.balance.abs(),
            direction,
            actor: actor.to_string(),
            counterparty: None,
            detail: notes.map(str::to_string),
        };

        let id = self.record(&movement).await?;
        info!(
            date = %date,
            balance = summary.balance.cents(),
            id = %id,
            "Period closed"
        );
        Ok(id)
    }

    /// Every movement posted for a document number, oldest first.
    pub async fn movements_for_document(&self, number: &str) -> DbResult<Vec<AccountingMovement>> {
        let sql = format!("{MOVEMENT_SELECT} WHERE document_number = ?1 ORDER BY created_at, rowid");
        let movements = sqlx::query_as::<_, AccountingMovement>(&sql)
            .bind(number)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Movements in `range` (all when `None`), oldest first.
    pub async fn list(&self, range: Option<DateRange>) -> DbResult<Vec<AccountingMovement>> {
        let (from, to) = match range {
            Some(r) => (Some(r.from), Some(r.to)),
            None => (None, None),
        };
        let sql = format!(
            r#"
            {MOVEMENT_SELECT}
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at, rowid
            "#
        );
        let movements = sqlx::query_as::<_, AccountingMovement>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn movement(doc_type: MovementDocType, number: &str, cents: i64, direction: Direction) -> NewMovement {
        NewMovement {
            document_type: doc_type,
            document_number: number.to_string(),
            description: "test".to_string(),
            amount: Money::from_cents(cents),
            direction,
            actor: "tester".to_string(),
            counterparty: None,
            detail: None,
        }
    }

    #[tokio::test]
    async fn test_summary_totals_and_counts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.accounting();

        ledger
            .record(&movement(MovementDocType::Sale, "FACT-1", 2204, Direction::Debit))
            .await
            .unwrap();
        ledger
            .record(&movement(MovementDocType::CostOfGoods, "FACT-1", 1400, Direction::Credit))
            .await
            .unwrap();
        ledger
            .record(&movement(MovementDocType::Payment, "FACT-1", 2204, Direction::Debit))
            .await
            .unwrap();

        let summary = ledger.summarize(None).await.unwrap();
        assert_eq!(summary.total_debits.cents(), 4408);
        assert_eq!(summary.total_credits.cents(), 1400);
        assert_eq!(summary.balance.cents(), 3008);
        assert_eq!(summary.count_by_doc_type[&MovementDocType::Sale], 1);
        assert_eq!(summary.count_by_doc_type[&MovementDocType::Payment], 1);

        assert_eq!(ledger.movements_for_document("FACT-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .accounting()
            .record(&movement(MovementDocType::Sale, "X", -1, Direction::Debit))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }

    #[tokio::test]
    async fn test_period_close_posts_absolute_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.accounting();
        ledger
            .record(&movement(MovementDocType::Quotation, "COT-1", 500, Direction::Credit))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let id = ledger.period_close(today, Some("month end"), "admin").await.unwrap();

        let all = ledger.list(None).await.unwrap();
        let close = all.iter().find(|m| m.id == id).unwrap();
        assert_eq!(close.document_type, MovementDocType::PeriodClose);
        assert_eq!(close.amount_cents, 500);
        assert_eq!(close.direction, Direction::Credit);
        assert_eq!(close.detail.as_deref(), Some("month end"));

        // the marker does not move the balance
        let summary = ledger.summarize(None).await.unwrap();
        assert_eq!(summary.balance.cents(), -500);
        assert_eq!(summary.count_by_doc_type[&MovementDocType::PeriodClose], 1);
    }

    #[tokio::test]
    async fn test_range_excludes_other_days() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.accounting();
        ledger
            .record(&movement(MovementDocType::Sale, "FACT-1", 100, Direction::Debit))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();

        assert_eq!(
            ledger.summarize(Some(DateRange::day(today))).await.unwrap().total_debits.cents(),
            100
        );
        assert!(ledger
            .list(Some(DateRange::day(yesterday)))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_ledger_rows_cannot_be_edited() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounting()
            .record(&movement(MovementDocType::Sale, "FACT-1", 100, Direction::Debit))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE movimientos_contables SET amount_cents = 0")
            .execute(db.pool())
            .await;
        let delete = sqlx::query("DELETE FROM movimientos_contables")
            .execute(db.pool())
            .await;

        assert!(update.is_err());
        assert!(delete.is_err());
    }
}
