//! # Document Sequence Counter
//!
//! Durable daily counters behind `COT-`, `ORD-` and `FACT-` numbers.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  secuencias_documento                                                   │
//! │  ┌────────┬──────────┬────────────┐                                     │
//! │  │ prefix │ day      │ last_value │                                     │
//! │  ├────────┼──────────┼────────────┤                                     │
//! │  │ COT    │ 20240315 │ 12         │                                     │
//! │  │ FACT   │ 20240315 │ 7          │ ◄── INSERT .. ON CONFLICT DO UPDATE │
//! │  └────────┴──────────┴────────────┘     last_value = last_value + 1     │
//! │                                         RETURNING last_value            │
//! │                                                                         │
//! │  Runs on the caller's transaction: if the document insert rolls back,  │
//! │  the counter bump rolls back with it, so numbers never have gaps.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use docflow_core::sequence::{day_key, SequenceNumber, MAX_DAILY_SEQUENCE};
use docflow_core::DocumentKind;

/// Allocates the next number for `kind` on `day`.
///
/// Must be called inside the transaction that inserts the document.
pub async fn next_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    day: NaiveDate,
) -> DbResult<SequenceNumber> {
    let prefix = kind.prefix();
    let key = day_key(day);

    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO secuencias_documento (prefix, day, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (prefix, day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(prefix)
    .bind(&key)
    .fetch_one(&mut *conn)
    .await?;

    if value > MAX_DAILY_SEQUENCE {
        return Err(DbError::SequenceExhausted {
            prefix: prefix.to_string(),
            day: key,
        });
    }

    let number = SequenceNumber::new(kind, day, value)
        .map_err(|e| DbError::Internal(e.to_string()))?;

    debug!(number = %number, "Allocated document number");
    Ok(number)
}

/// Last value handed out for `kind` on `day` (0 if none yet).
pub async fn current_value(pool: &SqlitePool, kind: DocumentKind, day: NaiveDate) -> DbResult<i64> {
    let value: Option<i64> = sqlx::query_scalar(
        "SELECT last_value FROM secuencias_documento WHERE prefix = ?1 AND day = ?2",
    )
    .bind(kind.prefix())
    .bind(day_key(day))
    .fetch_optional(pool)
    .await?;

    Ok(value.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn test_numbers_increment_per_prefix_and_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        let a = next_number(&mut tx, DocumentKind::Invoice, day()).await.unwrap();
        let b = next_number(&mut tx, DocumentKind::Invoice, day()).await.unwrap();
        let other = next_number(&mut tx, DocumentKind::Order, day()).await.unwrap();
        let next_day = next_number(&mut tx, DocumentKind::Invoice, day().succ_opt().unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.to_string(), "FACT-20240315-0001");
        assert_eq!(b.to_string(), "FACT-20240315-0002");
        assert_eq!(other.to_string(), "ORD-20240315-0001");
        assert_eq!(next_day.to_string(), "FACT-20240316-0001");
        assert_eq!(
            current_value(db.pool(), DocumentKind::Invoice, day()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_rolled_back_allocation_is_reused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        next_number(&mut tx, DocumentKind::Quotation, day()).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let n = next_number(&mut tx, DocumentKind::Quotation, day()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(n.value, 1);
    }

    #[tokio::test]
    async fn test_counter_exhaustion() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO secuencias_documento (prefix, day, last_value) VALUES ('ORD', '20240315', 9999)")
            .execute(db.pool())
            .await
            .unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let result = next_number(&mut tx, DocumentKind::Order, day()).await;
        assert!(matches!(result, Err(DbError::SequenceExhausted { .. })));
    }
}
