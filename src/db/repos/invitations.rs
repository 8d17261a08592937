use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::error::DbResult,
    models::{Invitation, NewInvitation},
};

/// Persistence for invitations.
///
/// "Active" means neither consumed nor revoked. "Pending" additionally means
/// created after `cutoff` (now minus the invitation TTL). At most one active
/// invitation exists per email; the store enforces it.
#[async_trait]
pub trait InvitationRepo: Send + Sync {
    /// Insert a new invitation. Returns `DbError::Conflict` if the email
    /// already has an active invitation or the token is taken.
    async fn insert(&self, input: NewInvitation) -> DbResult<Invitation>;

    async fn find_by_token(&self, token: &str) -> DbResult<Option<Invitation>>;

    /// The pending invitation for `email`, if any.
    async fn find_active_by_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Option<Invitation>>;

    /// Atomically consume a pending invitation and return its email, read
    /// from the row the write touched. Returns `None` if the token is
    /// unknown, already consumed, revoked or expired.
    async fn mark_consumed(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>>;

    /// Atomically revoke a pending invitation. Returns false under the same
    /// conditions as [`mark_consumed`](Self::mark_consumed).
    async fn revoke(&self, token: &str, cutoff: DateTime<Utc>, now: DateTime<Utc>)
    -> DbResult<bool>;

    /// Revoke active invitations for `email` created at or before `cutoff`,
    /// freeing the email for a new invitation. Returns rows affected.
    async fn retire_expired_for_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<u64>;
}
