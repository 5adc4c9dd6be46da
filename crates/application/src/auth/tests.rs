#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;
use pretty_assertions::assert_eq;
use renfound_domain::{ClientInfo, Session, UserId};

use super::{AuthOrchestrator, AuthSettings};
use crate::error::{AuthError, PublicError};
use crate::ports::{SessionRepository, TokenAuthority, UserRepository};
use crate::test_support::{epoch, FixedClock, ManualQueue, MemoryStore, StubTokens, StubVerifier};

struct Fixture {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    tokens: Arc<StubTokens>,
    queue: Arc<ManualQueue>,
    auth: AuthOrchestrator,
}

fn fixture_with_capacity(capacity: usize) -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(FixedClock::new(epoch()));
    let tokens = Arc::new(StubTokens::new());
    let queue = Arc::new(ManualQueue::with_capacity(capacity));
    let auth = AuthOrchestrator::new(
        store.clone(),
        store.clone(),
        Arc::new(StubVerifier::new(clock.clone())),
        tokens.clone(),
        queue.clone(),
        clock.clone(),
    );
    Fixture {
        store,
        clock,
        tokens,
        queue,
        auth,
    }
}

fn fixture() -> Fixture {
    fixture_with_capacity(16)
}

fn client() -> ClientInfo {
    ClientInfo::new(Some("test-agent".to_string()), Some("10.0.0.1".to_string()))
}

impl Fixture {
    async fn login(&self, external_id: i64, name: &str) -> renfound_domain::TokenPair {
        let pair = self
            .auth
            .login(&StubVerifier::payload(external_id, name), client())
            .await
            .unwrap();
        self.queue.run_all().await;
        pair
    }
}

#[tokio::test]
async fn test_first_login_creates_user_and_second_updates_it() {
    let fx = fixture();

    fx.login(42, "Neo").await;
    let first = fx.store.only_user();
    assert_eq!(first.external_id, 42);
    assert_eq!(first.first_name, "Neo");

    fx.clock.advance(Duration::minutes(5));
    fx.login(42, "Thomas").await;
    let second = fx.store.only_user();

    assert_eq!(second.id, first.id);
    assert_eq!(second.first_name, "Thomas");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
}

#[tokio::test]
async fn test_login_returns_before_session_is_written() {
    let fx = fixture();

    let pair = fx
        .auth
        .login(&StubVerifier::payload(7, "Trinity"), client())
        .await
        .unwrap();

    assert_eq!(fx.store.session_count(), 0);
    assert_eq!(fx.queue.pending(), 1);

    fx.queue.run_all().await;

    let user = fx.store.only_user();
    let sessions = fx.store.sessions_of(user.id);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].refresh_token, pair.refresh_token);
    assert_eq!(sessions[0].client, client());
    assert_eq!(sessions[0].expires_at, epoch() + Duration::days(7));
}

#[tokio::test]
async fn test_login_rejects_unverifiable_payload() {
    let fx = fixture();

    let err = fx.auth.login("garbage", client()).await.unwrap_err();

    assert_eq!(err, AuthError::InvalidCredentialPayload);
    assert_eq!(err.public(), PublicError::InvalidCredentials);
    assert_eq!(fx.store.user_count(), 0);
    assert_eq!(fx.queue.pending(), 0);
}

#[tokio::test]
async fn test_login_rejects_payload_older_than_max_age() {
    let fx = fixture();
    let auth = fx.auth.with_settings(AuthSettings {
        credential_max_age: Duration::hours(1),
    });

    let err = auth.login("42:Neo:7200", client()).await.unwrap_err();

    assert_eq!(err, AuthError::InvalidCredentialPayload);
}

#[tokio::test]
async fn test_refresh_rotates_and_old_token_stops_working() {
    let fx = fixture();
    let first = fx.login(42, "Neo").await;

    let second = fx.auth.refresh(&first.refresh_token, client()).await.unwrap();
    fx.queue.run_all().await;
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_ne!(second.access_token, first.access_token);

    let reused = fx.auth.refresh(&first.refresh_token, client()).await;
    assert_eq!(reused.unwrap_err(), AuthError::TokenInvalid);

    let third = fx.auth.refresh(&second.refresh_token, client()).await.unwrap();
    fx.queue.run_all().await;
    assert_ne!(third.refresh_token, second.refresh_token);

    let user = fx.store.only_user();
    assert_eq!(fx.store.sessions_of(user.id).len(), 1);
}

#[tokio::test]
async fn test_refresh_before_session_lands_is_invalid() {
    let fx = fixture();
    let pair = fx
        .auth
        .login(&StubVerifier::payload(42, "Neo"), client())
        .await
        .unwrap();

    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
}

#[tokio::test]
async fn test_dropped_persistence_still_returns_tokens() {
    let fx = fixture_with_capacity(0);

    let pair = fx
        .auth
        .login(&StubVerifier::payload(42, "Neo"), client())
        .await
        .unwrap();
    fx.queue.run_all().await;

    assert!(!pair.refresh_token.is_empty());
    assert_eq!(fx.store.session_count(), 0);
    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();
    assert_eq!(err, AuthError::TokenInvalid);
}

#[tokio::test]
async fn test_failed_persistence_is_not_surfaced() {
    let fx = fixture();
    fx.store.fail_session_writes.store(true, Ordering::SeqCst);

    let pair = fx.login(42, "Neo").await;

    assert!(!pair.access_token.is_empty());
    assert_eq!(fx.store.session_count(), 0);
}

#[tokio::test]
async fn test_refresh_with_expired_token() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;
    fx.tokens.expire(&pair.refresh_token);

    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenExpired);
    assert_eq!(err.public(), PublicError::TokenExpired);
}

#[tokio::test]
async fn test_refresh_with_access_token_is_invalid() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;

    let err = fx.auth.refresh(&pair.access_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
}

#[tokio::test]
async fn test_refresh_rejects_session_owned_by_someone_else() {
    let fx = fixture();
    fx.login(42, "Neo").await;
    let owner = fx.store.only_user().id;

    let stranger = UserId::generate();
    let forged = fx.tokens.issue_refresh_token(stranger).unwrap();
    let session = Session::new(owner, &forged, ClientInfo::default(), Duration::days(1), epoch());
    fx.store.create_session(&session).await.unwrap();

    let err = fx.auth.refresh(&forged, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
    assert_eq!(fx.store.sessions_of(owner).len(), 2);
}

#[tokio::test]
async fn test_refresh_rejects_expired_session_row() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;

    fx.clock.advance(Duration::days(8));
    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
}

#[tokio::test]
async fn test_refresh_for_deleted_user_is_invalid() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;
    let user = fx.store.only_user();

    // Sessions survive here so the lookup reaches the user check.
    let sessions = fx.store.sessions_of(user.id);
    fx.store.delete_user(user.id).await.unwrap();
    fx.store.create_session(&sessions[0]).await.unwrap();

    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
}

#[tokio::test]
async fn test_refresh_that_loses_the_rotation_race_is_invalid() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;
    fx.store.lose_delete_race.store(true, Ordering::SeqCst);

    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert_eq!(err, AuthError::TokenInvalid);
    assert_eq!(fx.queue.pending(), 0);
}

#[tokio::test]
async fn test_refresh_storage_failure_collapses_to_internal() {
    let fx = fixture();
    let pair = fx.login(42, "Neo").await;
    fx.store.fail_reads.store(true, Ordering::SeqCst);

    let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();

    assert!(matches!(err, AuthError::Storage(_)));
    assert_eq!(err.public(), PublicError::Internal);
}

#[tokio::test]
async fn test_signing_failure_is_internal() {
    let fx = fixture();
    fx.tokens.fail_signing.store(true, Ordering::SeqCst);

    let err = fx
        .auth
        .login(&StubVerifier::payload(42, "Neo"), client())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Internal(_)));
    assert_eq!(err.public(), PublicError::Internal);
    assert_eq!(fx.queue.pending(), 0);
}

#[tokio::test]
async fn test_logout_unknown_token_succeeds() {
    let fx = fixture();

    fx.auth.logout("never-issued").await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_only_that_session() {
    let fx = fixture();
    let phone = fx.login(42, "Neo").await;
    let laptop = fx.login(42, "Neo").await;

    fx.auth.logout(&phone.refresh_token).await.unwrap();

    let err = fx.auth.refresh(&phone.refresh_token, client()).await.unwrap_err();
    assert_eq!(err, AuthError::TokenInvalid);
    fx.auth.refresh(&laptop.refresh_token, client()).await.unwrap();
}

#[tokio::test]
async fn test_logout_all_invalidates_every_refresh_token() {
    let fx = fixture();
    let phone = fx.login(42, "Neo").await;
    let laptop = fx.login(42, "Neo").await;
    let other = fx.login(99, "Morpheus").await;
    let user_id = fx.tokens.validate_refresh_token(&phone.refresh_token).unwrap();

    fx.auth.logout_all(user_id).await.unwrap();

    for pair in [&phone, &laptop] {
        let err = fx.auth.refresh(&pair.refresh_token, client()).await.unwrap_err();
        assert_eq!(err, AuthError::TokenInvalid);
    }
    fx.auth.refresh(&other.refresh_token, client()).await.unwrap();
}

#[tokio::test]
async fn test_logout_all_without_sessions_succeeds() {
    let fx = fixture();

    fx.auth.logout_all(UserId::generate()).await.unwrap();
}
