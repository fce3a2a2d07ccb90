//! # Inventory Ledger
//!
//! Stock checks, deductions and the low-stock scan.
//!
//! ## Conditional Deduction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Check and decrement are ONE statement, so two invoices racing for     │
//! │  the last unit cannot both succeed:                                     │
//! │                                                                         │
//! │    UPDATE productos SET stock = stock - :qty                            │
//! │    WHERE code = :code AND stock >= :qty                                 │
//! │    RETURNING stock                                                      │
//! │                                                                         │
//! │    row returned ──► deducted, remaining stock                           │
//! │    no row       ──► re-read: unknown product or insufficient stock      │
//! │                                                                         │
//! │  The CHECK (stock >= 0) constraint backs this up at the schema level.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbResult, StockError};
use crate::repository::product::{ProductRow, PRODUCT_SELECT};
use docflow_core::InventoryItem;

/// Stock operations over the product catalog.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// `true` when the product exists and has at least `quantity` on hand.
    ///
    /// Advisory only: nothing is reserved.
    pub async fn check_availability(&self, code: &str, quantity: i64) -> DbResult<bool> {
        let stock = self.stock_of(code).await?;
        Ok(matches!(stock, Some(s) if s >= quantity))
    }

    /// Current stock, or `None` for an unknown product.
    pub async fn stock_of(&self, code: &str) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::read_stock(&mut conn, code).await
    }

    async fn read_stock(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM productos WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(stock)
    }

    /// Removes `quantity` units on the caller's transaction.
    ///
    /// ## Returns
    /// Remaining stock. On error the row is untouched.
    pub async fn deduct_stock(
        conn: &mut SqliteConnection,
        code: &str,
        quantity: i64,
    ) -> Result<i64, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE productos
            SET stock = stock - ?2, updated_at = ?3
            WHERE code = ?1 AND stock >= ?2
            RETURNING stock
            "#,
        )
        .bind(code)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        match remaining {
            Some(remaining) => {
                debug!(code = %code, quantity, remaining, "Stock deducted");
                Ok(remaining)
            }
            None => Err(Self::explain_refusal(conn, code, quantity).await),
        }
    }

    async fn explain_refusal(conn: &mut SqliteConnection, code: &str, requested: i64) -> StockError {
        match Self::read_stock(conn, code).await {
            Ok(Some(available)) => StockError::Insufficient {
                product_code: code.to_string(),
                available,
                requested,
            },
            Ok(None) => StockError::UnknownProduct(code.to_string()),
            Err(e) => StockError::Db(e),
        }
    }

    /// Manual correction (count, damage, restock). Never drives stock below zero.
    ///
    /// ## Returns
    /// Stock after the adjustment.
    pub async fn adjust_stock(&self, code: &str, delta: i64, reason: &str) -> Result<i64, StockError> {
        let mut conn = self.pool.acquire().await?;

        let after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE productos
            SET stock = stock + ?2, updated_at = ?3
            WHERE code = ?1 AND stock + ?2 >= 0
            RETURNING stock
            "#,
        )
        .bind(code)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        match after {
            Some(after) => {
                info!(code = %code, delta, after, reason = %reason, "Stock adjusted");
                Ok(after)
            }
            None => Err(Self::explain_refusal(&mut conn, code, -delta).await),
        }
    }

    /// Active products with stock strictly below `threshold`.
    ///
    /// Ordered by stock, then code, so the most urgent come first.
    pub async fn low_stock_scan(&self, threshold: i64) -> DbResult<Vec<InventoryItem>> {
        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.is_active = 1 AND p.stock < ?1 ORDER BY p.stock, p.code"
        );

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await?;

        debug!(threshold, count = rows.len(), "Low-stock scan");
        rows.into_iter().map(ProductRow::into_item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product, seeded_db};

    #[tokio::test]
    async fn test_check_availability() {
        let db = seeded_db().await;
        seed_product(&db, "P1", 5).await;

        let inv = db.inventory();
        assert!(inv.check_availability("P1", 5).await.unwrap());
        assert!(!inv.check_availability("P1", 6).await.unwrap());
        assert!(!inv.check_availability("NOPE", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_deduct_stock_success_and_refusal() {
        let db = seeded_db().await;
        seed_product(&db, "P1", 5).await;

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(InventoryLedger::deduct_stock(&mut tx, "P1", 2).await.unwrap(), 3);

        let err = InventoryLedger::deduct_stock(&mut tx, "P1", 4).await.unwrap_err();
        assert!(matches!(
            err,
            StockError::Insufficient {
                available: 3,
                requested: 4,
                ..
            }
        ));

        let err = InventoryLedger::deduct_stock(&mut tx, "NOPE", 1).await.unwrap_err();
        assert!(matches!(err, StockError::UnknownProduct(_)));

        let err = InventoryLedger::deduct_stock(&mut tx, "P1", 0).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity(0)));
        tx.commit().await.unwrap();

        assert_eq!(db.inventory().stock_of("P1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_adjust_never_goes_negative() {
        let db = seeded_db().await;
        seed_product(&db, "P1", 2).await;
        let inv = db.inventory();

        assert_eq!(inv.adjust_stock("P1", 10, "restock").await.unwrap(), 12);
        assert!(matches!(
            inv.adjust_stock("P1", -13, "damaged").await,
            Err(StockError::Insufficient { available: 12, requested: 13, .. })
        ));
        assert_eq!(inv.adjust_stock("P1", -12, "count").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_low_stock_scan_orders_by_urgency() {
        let db = seeded_db().await;
        seed_product(&db, "B", 3).await;
        seed_product(&db, "A", 3).await;
        seed_product(&db, "C", 0).await;
        seed_product(&db, "D", 5).await;

        let low = db.inventory().low_stock_scan(5).await.unwrap();
        let codes: Vec<_> = low.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["C", "A", "B"]);
    }
}
