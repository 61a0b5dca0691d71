use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::share::{
    Collaborator, CollaboratorRow, ShareKind, ShareOutcome, ShareRole, SharedItem, SharedItemRow,
};
use crate::models::user::UserRow;

/// Ownership of a shareable resource. `owner_id` is `None` for legacy rows
/// created before uploads were attributed to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOwner {
    pub owner_id: Option<Uuid>,
}

/// Persistence seam for share rows, carried in `AppState` as `Arc<dyn ShareStore>`.
#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError>;

    /// `None` when the resource does not exist.
    async fn resource_owner(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Option<ResourceOwner>, AppError>;

    /// Creates the share or overwrites its role in a single statement.
    async fn upsert_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
        role: ShareRole,
    ) -> Result<ShareOutcome, AppError>;

    /// Returns `false` when no share existed.
    async fn delete_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn share_role(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ShareRole>, AppError>;

    async fn shared_with(&self, kind: ShareKind, user_id: Uuid) -> Result<Vec<SharedItem>, AppError>;

    async fn collaborators(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Vec<Collaborator>, AppError>;
}

pub struct PgShareStore {
    pool: PgPool,
}

impl PgShareStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt_role(e: String) -> AppError {
    AppError::Internal(anyhow!("corrupt share row: {e}"))
}

#[async_trait]
impl ShareStore for PgShareStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn resource_owner(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Option<ResourceOwner>, AppError> {
        let sql = format!("SELECT user_id FROM {} WHERE id = $1", kind.resource_table());
        let row: Option<(Option<Uuid>,)> = sqlx::query_as(&sql)
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(owner_id,)| ResourceOwner { owner_id }))
    }

    async fn upsert_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
        role: ShareRole,
    ) -> Result<ShareOutcome, AppError> {
        // xmax is 0 only for a freshly inserted tuple.
        let sql = format!(
            r#"
            INSERT INTO {table} ({column}, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT ({column}, user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING (xmax = 0) AS inserted
            "#,
            table = kind.share_table(),
            column = kind.resource_column(),
        );
        let inserted: bool = sqlx::query_scalar(&sql)
            .bind(resource_id)
            .bind(user_id)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(if inserted {
            ShareOutcome::Created
        } else {
            ShareOutcome::Updated
        })
    }

    async fn delete_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND user_id = $2",
            kind.share_table(),
            kind.resource_column()
        );
        let result = sqlx::query(&sql)
            .bind(resource_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn share_role(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ShareRole>, AppError> {
        let sql = format!(
            "SELECT role FROM {} WHERE {} = $1 AND user_id = $2",
            kind.share_table(),
            kind.resource_column()
        );
        let role: Option<String> = sqlx::query_scalar(&sql)
            .bind(resource_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        role.map(|r| r.parse().map_err(corrupt_role)).transpose()
    }

    async fn shared_with(&self, kind: ShareKind, user_id: Uuid) -> Result<Vec<SharedItem>, AppError> {
        let sql = format!(
            r#"
            SELECT r.id, r.{title} AS title, s.role, s.created_at AS shared_at,
                   o.name AS owner_name, o.email AS owner_email
            FROM {shares} s
            JOIN {resources} r ON r.id = s.{column}
            LEFT JOIN users o ON o.id = r.user_id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC
            "#,
            title = kind.title_column(),
            shares = kind.share_table(),
            resources = kind.resource_table(),
            column = kind.resource_column(),
        );
        let rows: Vec<SharedItemRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| SharedItem::try_from(row).map_err(corrupt_role))
            .collect()
    }

    async fn collaborators(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Vec<Collaborator>, AppError> {
        let sql = format!(
            r#"
            SELECT s.id, s.user_id, u.name, u.email, u.avatar_url, s.role, s.created_at
            FROM {shares} s
            JOIN users u ON u.id = s.user_id
            WHERE s.{column} = $1
            ORDER BY s.created_at ASC
            "#,
            shares = kind.share_table(),
            column = kind.resource_column(),
        );
        let rows: Vec<CollaboratorRow> = sqlx::query_as(&sql)
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Collaborator::try_from(row).map_err(corrupt_role))
            .collect()
    }
}
