//! # Client Repository
//!
//! Client directory lookups and maintenance. Clients are keyed by their
//! external identification number and are never hard-deleted.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use docflow_core::Client;

const CLIENT_COLUMNS: &str = r#"
    id, name, email, phone, address, wholesale, credit_limit_cents,
    is_active, created_at, updated_at
"#;

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Gets a client by identification number.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Client>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets a client on an existing connection or transaction.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clientes WHERE id = ?1");

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(client)
    }

    /// Lists active clients by name.
    pub async fn list_active(&self) -> DbResult<Vec<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clientes WHERE is_active = 1 ORDER BY name");

        let clients = sqlx::query_as::<_, Client>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(clients)
    }

    /// Inserts a new client.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Identification number already registered
    pub async fn insert(&self, client: &Client) -> DbResult<()> {
        debug!(id = %client.id, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clientes (
                id, name, email, phone, address, wholesale, credit_limit_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(client.wholesale)
        .bind(client.credit_limit_cents)
        .bind(client.is_active)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates contact details, wholesale flag and credit limit.
    pub async fn update(&self, client: &Client) -> DbResult<()> {
        debug!(id = %client.id, "Updating client");

        let result = sqlx::query(
            r#"
            UPDATE clientes SET
                name = ?2,
                email = ?3,
                phone = ?4,
                address = ?5,
                wholesale = ?6,
                credit_limit_cents = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(client.wholesale)
        .bind(client.credit_limit_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", &client.id));
        }

        Ok(())
    }

    /// Activates or soft-deletes a client.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting client active flag");

        let result =
            sqlx::query("UPDATE clientes SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn client(id: &str, wholesale: bool) -> Client {
        let now = Utc::now();
        Client {
            id: id.to_string(),
            name: "Papelería Central".to_string(),
            email: Some("compras@central.example".to_string()),
            phone: None,
            address: None,
            wholesale,
            credit_limit_cents: 500_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();

        repo.insert(&client("0912345678", true)).await.unwrap();

        let found = repo.find_by_id("0912345678").await.unwrap().unwrap();
        assert!(found.wholesale);
        assert_eq!(found.credit_limit().cents(), 500_000);
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();
        let mut c = client("0912345678", false);
        repo.insert(&c).await.unwrap();

        c.wholesale = true;
        repo.update(&c).await.unwrap();
        repo.set_active(&c.id, false).await.unwrap();

        let found = repo.find_by_id(&c.id).await.unwrap().unwrap();
        assert!(found.wholesale);
        assert!(!found.is_active);
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_client() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.clients().update(&client("0000000000", false)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
