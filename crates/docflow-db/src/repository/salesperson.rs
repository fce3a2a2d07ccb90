//! # Salesperson Repository
//!
//! Read access to the user directory. The workflow never edits users; the
//! insert exists for seeding and tests.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use docflow_core::{Role, Salesperson};

/// Repository for system users who issue documents.
#[derive(Debug, Clone)]
pub struct SalespersonRepository {
    pool: SqlitePool,
}

impl SalespersonRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SalespersonRepository { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Salesperson>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Salesperson>> {
        let user = sqlx::query_as::<_, Salesperson>(
            "SELECT id, name, role, is_active FROM usuarios WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Lists active users with the given role.
    pub async fn list_by_role(&self, role: Role) -> DbResult<Vec<Salesperson>> {
        let users = sqlx::query_as::<_, Salesperson>(
            "SELECT id, name, role, is_active FROM usuarios WHERE role = ?1 AND is_active = 1 ORDER BY name",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn insert(&self, user: &Salesperson) -> DbResult<()> {
        debug!(id = %user.id, "Inserting user");

        sqlx::query("INSERT INTO usuarios (id, name, role, is_active) VALUES (?1, ?2, ?3, ?4)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(user.role)
            .bind(user.is_active)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
