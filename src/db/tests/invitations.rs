//! Shared tests for InvitationRepo implementations
//!
//! Each test takes a repo trait object so the same assertions cover the
//! in-memory store, SQLite and PostgreSQL.

use chrono::{DateTime, Duration, Utc};

use crate::{
    db::{DbError, repos::InvitationRepo},
    models::{NewInvitation, generate_invitation_token},
};

fn ttl() -> Duration {
    Duration::hours(168)
}

fn new_invitation(email: &str, created_at: DateTime<Utc>) -> NewInvitation {
    NewInvitation {
        email: email.to_string(),
        token: generate_invitation_token(),
        comment: Some("platform team".to_string()),
        created_at,
    }
}

// ============================================================================
// Shared Test Functions
// ============================================================================

pub async fn test_insert_and_find_by_token(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let created = repo
        .insert(new_invitation("alice@example.com", now))
        .await
        .expect("Failed to insert invitation");

    assert!(created.id > 0);
    assert_eq!(created.email, "alice@example.com");
    assert_eq!(created.comment.as_deref(), Some("platform team"));
    assert!(created.consumed_at.is_none());
    assert!(created.revoked_at.is_none());

    let fetched = repo
        .find_by_token(&created.token)
        .await
        .expect("Failed to fetch invitation")
        .expect("Invitation should exist");
    assert_eq!(fetched, created);
}

pub async fn test_find_by_token_unknown(repo: &dyn InvitationRepo) {
    let result = repo
        .find_by_token("inv_doesnotexist")
        .await
        .expect("Query should succeed");
    assert!(result.is_none());
}

pub async fn test_duplicate_active_email_conflicts(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    repo.insert(new_invitation("bob@example.com", now))
        .await
        .expect("First insert should succeed");

    let result = repo.insert(new_invitation("bob@example.com", now)).await;
    assert!(
        matches!(result, Err(DbError::Conflict(_))),
        "Expected Conflict, got {result:?}"
    );
}

pub async fn test_consumed_invitation_frees_email(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let first = repo
        .insert(new_invitation("carol@example.com", now))
        .await
        .expect("Failed to insert invitation");

    assert_eq!(
        repo.mark_consumed(&first.token, now - ttl(), now)
            .await
            .expect("Failed to consume")
            .as_deref(),
        Some("carol@example.com")
    );

    repo.insert(new_invitation("carol@example.com", now))
        .await
        .expect("Email should be free after consumption");
}

pub async fn test_mark_consumed_only_once(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let inv = repo
        .insert(new_invitation("dave@example.com", now))
        .await
        .expect("Failed to insert invitation");
    let cutoff = now - ttl();

    assert_eq!(
        repo.mark_consumed(&inv.token, cutoff, now).await.unwrap(),
        Some("dave@example.com".to_string())
    );
    assert!(
        repo.mark_consumed(&inv.token, cutoff, now)
            .await
            .unwrap()
            .is_none()
    );

    let fetched = repo.find_by_token(&inv.token).await.unwrap().unwrap();
    assert!(fetched.consumed_at.is_some());
    assert!(fetched.revoked_at.is_none());
}

pub async fn test_mark_consumed_concurrent_single_winner(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let inv = repo
        .insert(new_invitation("erin@example.com", now))
        .await
        .expect("Failed to insert invitation");
    let cutoff = now - ttl();

    let (a, b, c) = tokio::join!(
        repo.mark_consumed(&inv.token, cutoff, now),
        repo.mark_consumed(&inv.token, cutoff, now),
        repo.mark_consumed(&inv.token, cutoff, now),
    );
    let winners: Vec<String> = [a.unwrap(), b.unwrap(), c.unwrap()]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(winners, vec!["erin@example.com".to_string()]);
}

pub async fn test_mark_consumed_unknown_token(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let consumed = repo
        .mark_consumed("inv_doesnotexist", now - ttl(), now)
        .await
        .expect("Query should succeed");
    assert!(consumed.is_none());
}

pub async fn test_expired_invitation_not_consumable(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let inv = repo
        .insert(new_invitation("frank@example.com", now - Duration::days(10)))
        .await
        .expect("Failed to insert invitation");

    let consumed = repo
        .mark_consumed(&inv.token, now - ttl(), now)
        .await
        .unwrap();
    assert!(consumed.is_none());

    let fetched = repo.find_by_token(&inv.token).await.unwrap().unwrap();
    assert!(fetched.consumed_at.is_none());
}

pub async fn test_revoke_blocks_redemption(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let inv = repo
        .insert(new_invitation("grace@example.com", now))
        .await
        .expect("Failed to insert invitation");
    let cutoff = now - ttl();

    assert!(repo.revoke(&inv.token, cutoff, now).await.unwrap());
    assert!(!repo.revoke(&inv.token, cutoff, now).await.unwrap());
    assert!(
        repo.mark_consumed(&inv.token, cutoff, now)
            .await
            .unwrap()
            .is_none()
    );

    let fetched = repo.find_by_token(&inv.token).await.unwrap().unwrap();
    assert!(fetched.revoked_at.is_some());
    assert!(fetched.consumed_at.is_none());
}

pub async fn test_revoke_consumed_invitation_fails(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let inv = repo
        .insert(new_invitation("heidi@example.com", now))
        .await
        .expect("Failed to insert invitation");
    let cutoff = now - ttl();

    assert!(
        repo.mark_consumed(&inv.token, cutoff, now)
            .await
            .unwrap()
            .is_some()
    );
    assert!(!repo.revoke(&inv.token, cutoff, now).await.unwrap());
}

pub async fn test_find_active_by_email_ignores_expired(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    repo.insert(new_invitation("ivan@example.com", now - Duration::days(10)))
        .await
        .expect("Failed to insert invitation");

    let active = repo
        .find_active_by_email("ivan@example.com", now - ttl())
        .await
        .unwrap();
    assert!(active.is_none());

    let wider = repo
        .find_active_by_email("ivan@example.com", now - Duration::days(30))
        .await
        .unwrap();
    assert!(wider.is_some());
}

pub async fn test_retire_expired_frees_email(repo: &dyn InvitationRepo) {
    let now = Utc::now();
    let stale = repo
        .insert(new_invitation("judy@example.com", now - Duration::days(10)))
        .await
        .expect("Failed to insert invitation");
    let cutoff = now - ttl();

    let retired = repo
        .retire_expired_for_email("judy@example.com", cutoff, now)
        .await
        .unwrap();
    assert_eq!(retired, 1);

    let fetched = repo.find_by_token(&stale.token).await.unwrap().unwrap();
    assert!(fetched.revoked_at.is_some());

    let fresh = repo
        .insert(new_invitation("judy@example.com", now))
        .await
        .expect("Email should be free after retiring the expired invitation");

    // Pending invitations are untouched
    let retired = repo
        .retire_expired_for_email("judy@example.com", cutoff, now)
        .await
        .unwrap();
    assert_eq!(retired, 0);
    let fetched = repo.find_by_token(&fresh.token).await.unwrap().unwrap();
    assert!(fetched.revoked_at.is_none());
}

// ============================================================================
// In-memory Tests
// ============================================================================

mod memory_tests {
    use crate::db::MemoryInvitationRepo;

    macro_rules! memory_test {
        ($test_name:ident) => {
            #[tokio::test]
            async fn $test_name() {
                let repo = MemoryInvitationRepo::new();
                super::$test_name(&repo).await;
            }
        };
    }

    memory_test!(test_insert_and_find_by_token);
    memory_test!(test_find_by_token_unknown);
    memory_test!(test_duplicate_active_email_conflicts);
    memory_test!(test_consumed_invitation_frees_email);
    memory_test!(test_mark_consumed_only_once);
    memory_test!(test_mark_consumed_concurrent_single_winner);
    memory_test!(test_mark_consumed_unknown_token);
    memory_test!(test_expired_invitation_not_consumable);
    memory_test!(test_revoke_blocks_redemption);
    memory_test!(test_revoke_consumed_invitation_fails);
    memory_test!(test_find_active_by_email_ignores_expired);
    memory_test!(test_retire_expired_frees_email);
}

// ============================================================================
// SQLite Tests
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use crate::db::{
        sqlite::SqliteInvitationRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repo() -> SqliteInvitationRepo {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        SqliteInvitationRepo::new(pool)
    }

    macro_rules! sqlite_test {
        ($test_name:ident) => {
            #[tokio::test]
            async fn $test_name() {
                let repo = create_repo().await;
                super::$test_name(&repo).await;
            }
        };
    }

    sqlite_test!(test_insert_and_find_by_token);
    sqlite_test!(test_find_by_token_unknown);
    sqlite_test!(test_duplicate_active_email_conflicts);
    sqlite_test!(test_consumed_invitation_frees_email);
    sqlite_test!(test_mark_consumed_only_once);
    sqlite_test!(test_mark_consumed_concurrent_single_winner);
    sqlite_test!(test_mark_consumed_unknown_token);
    sqlite_test!(test_expired_invitation_not_consumable);
    sqlite_test!(test_revoke_blocks_redemption);
    sqlite_test!(test_revoke_consumed_invitation_fails);
    sqlite_test!(test_find_active_by_email_ignores_expired);
    sqlite_test!(test_retire_expired_frees_email);
}

// ============================================================================
// PostgreSQL Tests
// ============================================================================

#[cfg(feature = "database-postgres")]
mod postgres_tests {
    use crate::db::{
        postgres::PostgresInvitationRepo,
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($test_name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $test_name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresInvitationRepo::new(pool, None);
                super::$test_name(&repo).await;
            }
        };
    }

    postgres_test!(test_insert_and_find_by_token);
    postgres_test!(test_find_by_token_unknown);
    postgres_test!(test_duplicate_active_email_conflicts);
    postgres_test!(test_consumed_invitation_frees_email);
    postgres_test!(test_mark_consumed_only_once);
    postgres_test!(test_mark_consumed_concurrent_single_winner);
    postgres_test!(test_mark_consumed_unknown_token);
    postgres_test!(test_expired_invitation_not_consumable);
    postgres_test!(test_revoke_blocks_redemption);
    postgres_test!(test_revoke_consumed_invitation_fails);
    postgres_test!(test_find_active_by_email_ignores_expired);
    postgres_test!(test_retire_expired_frees_email);
}
