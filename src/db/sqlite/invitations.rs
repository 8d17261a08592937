use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::InvitationRepo,
    },
    models::{Invitation, NewInvitation},
};

pub struct SqliteInvitationRepo {
    pool: SqlitePool,
}

impl SqliteInvitationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Invitation {
        Invitation {
            id: row.get("id"),
            email: row.get("email"),
            token: row.get("token"),
            comment: row.get("comment"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            consumed_at: row.get("consumed_at"),
            revoked_at: row.get("revoked_at"),
        }
    }
}

#[async_trait]
impl InvitationRepo for SqliteInvitationRepo {
    async fn insert(&self, input: NewInvitation) -> DbResult<Invitation> {
        let now = input.created_at.trunc_subsecs(3);

        let result = sqlx::query(
            r#"
            INSERT INTO invitations (email, token, comment, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.email)
        .bind(&input.token)
        .bind(&input.comment)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!(
                    "An active invitation already exists for '{}'",
                    input.email
                ))
            }
            _ => DbError::from(e),
        })?;

        Ok(Invitation {
            id: result.last_insert_rowid(),
            email: input.email,
            token: input.token,
            comment: input.comment,
            created_at: now,
            updated_at: now,
            consumed_at: None,
            revoked_at: None,
        })
    }

    async fn find_by_token(&self, token: &str) -> DbResult<Option<Invitation>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, token, comment, created_at, updated_at, consumed_at, revoked_at
            FROM invitations
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Option<Invitation>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, token, comment, created_at, updated_at, consumed_at, revoked_at
            FROM invitations
            WHERE email = ? AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(cutoff.trunc_subsecs(3))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn mark_consumed(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let now = now.trunc_subsecs(3);

        // Single conditional UPDATE; SQLite serializes writers so only one
        // concurrent redemption can match the row
        let row = sqlx::query(
            r#"
            UPDATE invitations
            SET consumed_at = ?, updated_at = ?
            WHERE token = ? AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > ?
            RETURNING email
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(token)
        .bind(cutoff.trunc_subsecs(3))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("email")))
    }

    async fn revoke(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let now = now.trunc_subsecs(3);

        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET revoked_at = ?, updated_at = ?
            WHERE token = ? AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(token)
        .bind(cutoff.trunc_subsecs(3))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn retire_expired_for_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let now = now.trunc_subsecs(3);

        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET revoked_at = ?, updated_at = ?
            WHERE email = ? AND consumed_at IS NULL AND revoked_at IS NULL AND created_at <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(email)
        .bind(cutoff.trunc_subsecs(3))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
