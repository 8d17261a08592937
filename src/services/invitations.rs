//! Invitation onboarding.
//!
//! An invitation binds a single-use token to an email address. It can be
//! redeemed exactly once before it expires, and an email holds at most one
//! pending invitation at a time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::Validate;

use crate::{
    config::InvitationsConfig,
    db::{DbError, InvitationRepo},
    models::{
        CreateInvitation, Invitation, InvitationState, NewInvitation, generate_invitation_token,
        is_well_formed_token,
    },
};

#[derive(Debug, Error)]
pub enum InvitationError {
    /// Unknown, malformed, expired, revoked or already redeemed.
    #[error("Invitation token is invalid or no longer usable")]
    InvalidToken,

    #[error("A pending invitation already exists for '{0}'")]
    DuplicateActiveInvitation(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invitation TTL of {0} cannot be applied to the current time")]
    InvalidTtl(Duration),

    #[error(transparent)]
    Storage(#[from] DbError),
}

pub type InvitationResult<T> = Result<T, InvitationError>;

/// An invitation together with its lifecycle state at the time of lookup.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationStatus {
    pub email: String,
    pub comment: Option<String>,
    pub state: InvitationState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Service layer for invitation operations
#[derive(Clone)]
pub struct InvitationService {
    repo: Arc<dyn InvitationRepo>,
    ttl: Duration,
}

impl InvitationService {
    pub fn new(repo: Arc<dyn InvitationRepo>, config: &InvitationsConfig) -> Self {
        Self {
            repo,
            ttl: config.ttl(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creation time before which an invitation has expired.
    fn cutoff(&self, now: DateTime<Utc>) -> InvitationResult<DateTime<Utc>> {
        now.checked_sub_signed(self.ttl)
            .ok_or(InvitationError::InvalidTtl(self.ttl))
    }

    /// Issue a new invitation for `email`.
    ///
    /// Expired invitations for the same address are retired first so they
    /// no longer block a fresh one.
    #[tracing::instrument(skip(self, comment))]
    pub async fn issue(&self, email: &str, comment: Option<&str>) -> InvitationResult<Invitation> {
        let input = CreateInvitation::new(email, comment);
        input
            .validate()
            .map_err(|e| InvitationError::InvalidEmail(format!("'{}': {}", input.email, e)))?;

        let now = Utc::now();
        let cutoff = self.cutoff(now)?;

        let retired = self
            .repo
            .retire_expired_for_email(&input.email, cutoff, now)
            .await?;
        if retired > 0 {
            tracing::debug!(retired, "Retired expired invitations");
        }

        if self
            .repo
            .find_active_by_email(&input.email, cutoff)
            .await?
            .is_some()
        {
            return Err(InvitationError::DuplicateActiveInvitation(input.email));
        }

        let invitation = self
            .repo
            .insert(NewInvitation {
                email: input.email.clone(),
                token: generate_invitation_token(),
                comment: input.comment,
                created_at: now,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent issue for the same email
                DbError::Conflict(_) => {
                    InvitationError::DuplicateActiveInvitation(input.email.clone())
                }
                other => InvitationError::Storage(other),
            })?;

        tracing::info!(invitation_id = invitation.id, "Issued invitation");
        Ok(invitation)
    }

    /// Redeem a token, returning the invited email.
    ///
    /// Consumption is a single conditional write, so of any number of
    /// concurrent redemptions exactly one succeeds.
    #[tracing::instrument(skip_all)]
    pub async fn redeem(&self, token: &str) -> InvitationResult<String> {
        if !is_well_formed_token(token) {
            return Err(InvitationError::InvalidToken);
        }

        let now = Utc::now();
        let Some(email) = self
            .repo
            .mark_consumed(token, self.cutoff(now)?, now)
            .await?
        else {
            tracing::debug!("Invitation redemption rejected");
            return Err(InvitationError::InvalidToken);
        };

        tracing::info!("Redeemed invitation");
        Ok(email)
    }

    /// Look up an invitation without changing it.
    ///
    /// Malformed and unknown tokens both yield `None`.
    #[tracing::instrument(skip_all)]
    pub async fn inspect(&self, token: &str) -> InvitationResult<Option<InvitationStatus>> {
        if !is_well_formed_token(token) {
            return Ok(None);
        }

        let now = Utc::now();
        Ok(self
            .repo
            .find_by_token(token)
            .await?
            .map(|invitation| InvitationStatus {
                state: invitation.state(self.ttl, now),
                expires_at: invitation.expires_at(self.ttl),
                email: invitation.email,
                comment: invitation.comment,
                created_at: invitation.created_at,
                consumed_at: invitation.consumed_at,
                revoked_at: invitation.revoked_at,
            }))
    }

    /// Withdraw a pending invitation.
    #[tracing::instrument(skip_all)]
    pub async fn revoke(&self, token: &str) -> InvitationResult<()> {
        if !is_well_formed_token(token) {
            return Err(InvitationError::InvalidToken);
        }

        let now = Utc::now();
        if !self.repo.revoke(token, self.cutoff(now)?, now).await? {
            return Err(InvitationError::InvalidToken);
        }

        tracing::info!("Revoked invitation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryInvitationRepo;

    fn service_with(repo: Arc<dyn InvitationRepo>) -> InvitationService {
        InvitationService::new(repo, &InvitationsConfig::default())
    }

    fn memory_service() -> (Arc<MemoryInvitationRepo>, InvitationService) {
        let repo = Arc::new(MemoryInvitationRepo::new());
        let service = service_with(repo.clone());
        (repo, service)
    }

    #[tokio::test]
    async fn test_issue_then_redeem() {
        let (_, service) = memory_service();

        let invitation = service
            .issue(" New.Hire@Example.com ", Some("backend team"))
            .await
            .unwrap();
        assert_eq!(invitation.email, "new.hire@example.com");
        assert_eq!(invitation.comment.as_deref(), Some("backend team"));
        assert_eq!(invitation.created_at, invitation.updated_at);
        assert!(is_well_formed_token(&invitation.token));

        let email = service.redeem(&invitation.token).await.unwrap();
        assert_eq!(email, "new.hire@example.com");

        let second = service.redeem(&invitation.token).await;
        assert!(matches!(second, Err(InvitationError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_issue_rejects_invalid_email() {
        let (_, service) = memory_service();
        let result = service.issue("not-an-email", None).await;
        assert!(matches!(result, Err(InvitationError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_issue_rejects_duplicate_pending() {
        let (_, service) = memory_service();
        service.issue("dup@example.com", None).await.unwrap();

        let result = service.issue("DUP@example.com", None).await;
        match result {
            Err(InvitationError::DuplicateActiveInvitation(email)) => {
                assert_eq!(email, "dup@example.com")
            }
            other => panic!("Expected DuplicateActiveInvitation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_after_redeem_is_allowed() {
        let (_, service) = memory_service();
        let first = service.issue("again@example.com", None).await.unwrap();
        service.redeem(&first.token).await.unwrap();

        let second = service.issue("again@example.com", None).await.unwrap();
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn test_issue_retires_expired_invitation() {
        let (repo, service) = memory_service();
        let stale = repo
            .insert(NewInvitation {
                email: "late@example.com".into(),
                token: generate_invitation_token(),
                comment: None,
                created_at: Utc::now() - Duration::days(8),
            })
            .await
            .unwrap();

        let fresh = service.issue("late@example.com", None).await.unwrap();
        assert_ne!(fresh.token, stale.token);

        let status = service.inspect(&stale.token).await.unwrap().unwrap();
        assert_eq!(status.state, InvitationState::Revoked);
    }

    #[tokio::test]
    async fn test_redeem_expired_token() {
        let (repo, service) = memory_service();
        let stale = repo
            .insert(NewInvitation {
                email: "expired@example.com".into(),
                token: generate_invitation_token(),
                comment: None,
                created_at: Utc::now() - Duration::hours(169),
            })
            .await
            .unwrap();

        let result = service.redeem(&stale.token).await;
        assert!(matches!(result, Err(InvitationError::InvalidToken)));

        let status = service.inspect(&stale.token).await.unwrap().unwrap();
        assert_eq!(status.state, InvitationState::Expired);
    }

    #[tokio::test]
    async fn test_redeem_unknown_and_malformed_tokens() {
        let (_, service) = memory_service();

        let unknown = generate_invitation_token();
        for token in ["", "garbage", "inv_short", unknown.as_str()] {
            let result = service.redeem(token).await;
            assert!(
                matches!(result, Err(InvitationError::InvalidToken)),
                "{token:?} should be rejected"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeem_has_single_winner() {
        let (_, service) = memory_service();
        let service = Arc::new(service);
        let invitation = service.issue("race@example.com", None).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let token = invitation.token.clone();
                tokio::spawn(async move { service.redeem(&token).await })
            })
            .collect();

        let mut winners = 0;
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(email) => {
                    assert_eq!(email, "race@example.com");
                    winners += 1;
                }
                Err(InvitationError::InvalidToken) => losers += 1,
                Err(other) => panic!("Unexpected error: {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(losers, 7);
    }

    #[tokio::test]
    async fn test_inspect_reports_state() {
        let (_, service) = memory_service();
        assert!(service.inspect("garbage").await.unwrap().is_none());
        assert!(
            service
                .inspect(&generate_invitation_token())
                .await
                .unwrap()
                .is_none()
        );

        let invitation = service
            .issue("look@example.com", Some("ops"))
            .await
            .unwrap();
        let status = service.inspect(&invitation.token).await.unwrap().unwrap();
        assert_eq!(status.email, "look@example.com");
        assert_eq!(status.comment.as_deref(), Some("ops"));
        assert_eq!(status.state, InvitationState::Pending);
        assert_eq!(status.expires_at, invitation.created_at + Duration::hours(168));
    }

    #[tokio::test]
    async fn test_revoke() {
        let (_, service) = memory_service();
        let invitation = service.issue("withdrawn@example.com", None).await.unwrap();

        service.revoke(&invitation.token).await.unwrap();
        assert!(matches!(
            service.revoke(&invitation.token).await,
            Err(InvitationError::InvalidToken)
        ));
        assert!(matches!(
            service.redeem(&invitation.token).await,
            Err(InvitationError::InvalidToken)
        ));

        // Revocation frees the email
        service.issue("withdrawn@example.com", None).await.unwrap();
    }

    /// Writes go through; reads never see a row, like a replica that has
    /// not caught up yet.
    struct StaleReads(MemoryInvitationRepo);

    #[async_trait::async_trait]
    impl InvitationRepo for StaleReads {
        async fn insert(&self, input: NewInvitation) -> crate::db::DbResult<Invitation> {
            self.0.insert(input).await
        }

        async fn find_by_token(&self, _token: &str) -> crate::db::DbResult<Option<Invitation>> {
            Ok(None)
        }

        async fn find_active_by_email(
            &self,
            _email: &str,
            _cutoff: DateTime<Utc>,
        ) -> crate::db::DbResult<Option<Invitation>> {
            Ok(None)
        }

        async fn mark_consumed(
            &self,
            token: &str,
            cutoff: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> crate::db::DbResult<Option<String>> {
            self.0.mark_consumed(token, cutoff, now).await
        }

        async fn revoke(
            &self,
            token: &str,
            cutoff: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> crate::db::DbResult<bool> {
            self.0.revoke(token, cutoff, now).await
        }

        async fn retire_expired_for_email(
            &self,
            email: &str,
            cutoff: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> crate::db::DbResult<u64> {
            self.0.retire_expired_for_email(email, cutoff, now).await
        }
    }

    #[tokio::test]
    async fn test_redeem_does_not_depend_on_reads() {
        let service = service_with(Arc::new(StaleReads(MemoryInvitationRepo::new())));
        let invitation = service.issue("lagging@example.com", None).await.unwrap();

        let email = service.redeem(&invitation.token).await.unwrap();
        assert_eq!(email, "lagging@example.com");
        assert!(matches!(
            service.redeem(&invitation.token).await,
            Err(InvitationError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let repo = Arc::new(MemoryInvitationRepo::new());
        let invitation = repo
            .insert(NewInvitation {
                email: "forever@example.com".into(),
                token: generate_invitation_token(),
                comment: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        // Built directly, skipping config validation
        let service = InvitationService::new(
            repo,
            &InvitationsConfig {
                ttl_hours: u32::MAX,
            },
        );

        assert!(matches!(
            service.issue("forever@example.com", None).await,
            Err(InvitationError::InvalidTtl(_))
        ));
        assert!(matches!(
            service.redeem(&invitation.token).await,
            Err(InvitationError::InvalidTtl(_))
        ));
        assert!(matches!(
            service.revoke(&invitation.token).await,
            Err(InvitationError::InvalidTtl(_))
        ));

        let status = service.inspect(&invitation.token).await.unwrap().unwrap();
        assert_eq!(status.state, InvitationState::Pending);
        assert_eq!(status.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[cfg(feature = "database-sqlite")]
    mod sqlite {
        use super::*;
        use crate::db::{
            DbPool,
            tests::harness::{create_sqlite_pool, run_sqlite_migrations},
        };

        async fn sqlite_service() -> InvitationService {
            let pool = create_sqlite_pool().await;
            run_sqlite_migrations(&pool).await;
            let db = DbPool::from_sqlite(pool);
            service_with(db.invitations())
        }

        #[tokio::test]
        async fn test_issue_then_redeem_sqlite() {
            let service = sqlite_service().await;
            let invitation = service.issue("sql@example.com", None).await.unwrap();

            assert_eq!(
                service.redeem(&invitation.token).await.unwrap(),
                "sql@example.com"
            );
            assert!(matches!(
                service.redeem(&invitation.token).await,
                Err(InvitationError::InvalidToken)
            ));

            let status = service.inspect(&invitation.token).await.unwrap().unwrap();
            assert_eq!(status.state, InvitationState::Consumed);
        }

        #[tokio::test]
        async fn test_duplicate_pending_sqlite() {
            let service = sqlite_service().await;
            service.issue("twice@example.com", None).await.unwrap();
            assert!(matches!(
                service.issue("twice@example.com", None).await,
                Err(InvitationError::DuplicateActiveInvitation(_))
            ));
        }

        #[tokio::test]
        async fn test_concurrent_redeem_sqlite() {
            let service = sqlite_service().await;
            let invitation = service.issue("race@example.com", None).await.unwrap();

            let (a, b) = tokio::join!(
                service.redeem(&invitation.token),
                service.redeem(&invitation.token)
            );
            let winners = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
            assert_eq!(winners, 1);
        }
    }
}
