//! In-process invitation store for development and tests.
//!
//! Every operation holds one mutex for its whole check-and-set, which gives
//! the same single-winner guarantee as the conditional UPDATEs in SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{DbError, DbResult, InvitationRepo};
use crate::models::{Invitation, NewInvitation};

#[derive(Default)]
pub struct MemoryInvitationRepo {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<Invitation>,
    next_id: i64,
}

impl MemoryInvitationRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_active(inv: &Invitation) -> bool {
    inv.consumed_at.is_none() && inv.revoked_at.is_none()
}

fn is_pending(inv: &Invitation, cutoff: DateTime<Utc>) -> bool {
    is_active(inv) && inv.created_at > cutoff
}

#[async_trait]
impl InvitationRepo for MemoryInvitationRepo {
    async fn insert(&self, input: NewInvitation) -> DbResult<Invitation> {
        let mut state = self.state.lock();

        if state
            .rows
            .iter()
            .any(|inv| is_active(inv) && inv.email == input.email)
        {
            return Err(DbError::Conflict(format!(
                "An active invitation already exists for '{}'",
                input.email
            )));
        }
        if state.rows.iter().any(|inv| inv.token == input.token) {
            return Err(DbError::Conflict("Invitation token already exists".into()));
        }

        state.next_id += 1;
        let invitation = Invitation {
            id: state.next_id,
            email: input.email,
            token: input.token,
            comment: input.comment,
            created_at: input.created_at,
            updated_at: input.created_at,
            consumed_at: None,
            revoked_at: None,
        };
        state.rows.push(invitation.clone());
        Ok(invitation)
    }

    async fn find_by_token(&self, token: &str) -> DbResult<Option<Invitation>> {
        let state = self.state.lock();
        Ok(state.rows.iter().find(|inv| inv.token == token).cloned())
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Option<Invitation>> {
        let state = self.state.lock();
        Ok(state
            .rows
            .iter()
            .filter(|inv| inv.email == email && is_pending(inv, cutoff))
            .max_by_key(|inv| inv.created_at)
            .cloned())
    }

    async fn mark_consumed(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let mut state = self.state.lock();
        Ok(state
            .rows
            .iter_mut()
            .find(|inv| inv.token == token && is_pending(inv, cutoff))
            .map(|inv| {
                inv.consumed_at = Some(now);
                inv.updated_at = now;
                inv.email.clone()
            }))
    }

    async fn revoke(
        &self,
        token: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut state = self.state.lock();
        match state
            .rows
            .iter_mut()
            .find(|inv| inv.token == token && is_pending(inv, cutoff))
        {
            Some(inv) => {
                inv.revoked_at = Some(now);
                inv.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retire_expired_for_email(
        &self,
        email: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let mut state = self.state.lock();
        let mut retired = 0;
        for inv in state
            .rows
            .iter_mut()
            .filter(|inv| inv.email == email && is_active(inv) && inv.created_at <= cutoff)
        {
            inv.revoked_at = Some(now);
            inv.updated_at = now;
            retired += 1;
        }
        Ok(retired)
    }
}
