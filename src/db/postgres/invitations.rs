use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::InvitationRepo,
    },
    models::{Invitation, NewInvitation},
};

pub struct PostgresInvitationRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresInvitationRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn from_row(row: &PgRow) -> Invitation {
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
impl InvitationRepo for PostgresInvitationRepo {
    async fn insert(&self, input: NewInvitation) -> DbResult<Invitation> {
        let now = input.created_at.trunc_subsecs(6);

        let row = sqlx::query(
            r#"
            INSERT INTO invitations (email, token, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id
            "#,
        )
        .bind(&input.email)
        .bind(&input.token)
        .bind(&input.comment)
        .bind(now)
        .fetch_one(&self.write_pool)
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
            id: row.get("id"),
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
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.read_pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Option<Invitation>> {
        // Primary pool: issuing decides on this read
        let row = sqlx::query(
            r#"
            SELECT id, email, token, comment, created_at, updated_at, consumed_at, revoked_at
            FROM invitations
            WHERE email = $1 AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(cutoff)
        .fetch_optional(&self.write_pool)
        .await?;

        Ok(row.as_ref().map(Self::from_row))
    }

    async fn mark_consumed(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        // The email comes back from the primary so a lagging replica cannot
        // hide the row just consumed
        let row = sqlx::query(
            r#"
            UPDATE invitations
            SET consumed_at = $1, updated_at = $1
            WHERE token = $2 AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > $3
            RETURNING email
            "#,
        )
        .bind(now.trunc_subsecs(6))
        .bind(token)
        .bind(cutoff)
        .fetch_optional(&self.write_pool)
        .await?;

        Ok(row.map(|row| row.get("email")))
    }

    async fn revoke(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET revoked_at = $1, updated_at = $1
            WHERE token = $2 AND consumed_at IS NULL AND revoked_at IS NULL AND created_at > $3
            "#,
        )
        .bind(now.trunc_subsecs(6))
        .bind(token)
        .bind(cutoff)
        .execute(&self.write_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn retire_expired_for_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET revoked_at = $1, updated_at = $1
            WHERE email = $2 AND consumed_at IS NULL AND revoked_at IS NULL AND created_at <= $3
            "#,
        )
        .bind(now.trunc_subsecs(6))
        .bind(email)
        .bind(cutoff)
        .execute(&self.write_pool)
        .await?;

        Ok(result.rows_affected())
    }
}
