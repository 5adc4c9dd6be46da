//! Test doubles for the application ports.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use renfound_domain::{Claims, ExternalIdentity, Session, SessionId, TokenKind, User, UserId};

use crate::ports::{
    Clock, CredentialError, CredentialVerifier, RepositoryError, SessionRepository, Task,
    TaskQueue, TokenAuthority, TokenError, UserRepository,
};

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
}

/// Clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Users and sessions in hash maps, with switches for failure injection.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, User>>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    pub fail_reads: AtomicBool,
    pub fail_session_writes: AtomicBool,
    pub lose_delete_race: AtomicBool,
}

impl MemoryStore {
    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn sessions_of(&self, user_id: UserId) -> Vec<Session> {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn only_user(&self) -> User {
        let users = self.users.lock();
        assert_eq!(users.len(), 1, "expected exactly one user");
        users.values().next().cloned().unwrap()
    }

    fn check_reads(&self) -> Result<(), RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("read failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.lock();
        if users.values().any(|u| u.external_id == user.external_id) {
            return Err(RepositoryError::Conflict("external id taken".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        self.check_reads()?;
        self.users.lock().get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn get_user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError> {
        self.check_reads()?;
        self.users
            .lock()
            .values()
            .find(|u| u.external_id == external_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.lock();
        let slot = users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        *slot = user.clone();
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        self.users.lock().remove(&id).ok_or(RepositoryError::NotFound)?;
        self.sessions.lock().retain(|_, s| s.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        if self.fail_session_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("write failed".to_string()));
        }
        let mut sessions = self.sessions.lock();
        if sessions
            .values()
            .any(|s| s.refresh_token == session.refresh_token)
        {
            return Err(RepositoryError::Conflict("refresh token taken".to_string()));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session_by_token(&self, refresh_token: &str) -> Result<Session, RepositoryError> {
        self.check_reads()?;
        self.sessions
            .lock()
            .values()
            .find(|s| s.refresh_token == refresh_token)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let removed = self.sessions.lock().remove(&id).is_some();
        // Another request got there first.
        if self.lose_delete_race.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(removed)
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Accepts payloads of the form `<external_id>:<first_name>[:<age_secs>]`.
pub struct StubVerifier {
    clock: Arc<FixedClock>,
}

impl StubVerifier {
    pub const fn new(clock: Arc<FixedClock>) -> Self {
        Self { clock }
    }

    pub fn payload(external_id: i64, first_name: &str) -> String {
        format!("{external_id}:{first_name}")
    }
}

impl CredentialVerifier for StubVerifier {
    fn verify(&self, payload: &str, max_age: Duration) -> Result<ExternalIdentity, CredentialError> {
        let mut parts = payload.split(':');
        let external_id = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(|| CredentialError::new("malformed"))?;
        let first_name = parts.next().ok_or_else(|| CredentialError::new("no user"))?;
        let age = parts
            .next()
            .map_or(Ok(0), str::parse::<i64>)
            .map_err(|_| CredentialError::new("bad age"))?;
        if Duration::seconds(age) > max_age {
            return Err(CredentialError::new("expired"));
        }
        let auth_date = self.clock.now() - Duration::seconds(age);
        ExternalIdentity::new(external_id, first_name, auth_date)
            .map_err(|e| CredentialError::new(e.to_string()))
    }
}

/// Readable, unsigned tokens: `access.<user>.<external>.<n>` and
/// `refresh.<user>.<n>`.
pub struct StubTokens {
    counter: AtomicU64,
    expired: Mutex<HashSet<String>>,
    pub fail_signing: AtomicBool,
}

impl StubTokens {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            expired: Mutex::new(HashSet::new()),
            fail_signing: AtomicBool::new(false),
        }
    }

    pub fn expire(&self, token: &str) {
        self.expired.lock().insert(token.to_string());
    }

    fn next(&self) -> Result<u64, TokenError> {
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(TokenError::Signing("key unavailable".to_string()));
        }
        Ok(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    fn check(&self, token: &str, kind: TokenKind) -> Result<Vec<String>, TokenError> {
        let parts: Vec<String> = token.split('.').map(str::to_string).collect();
        if parts.first().map(String::as_str) != Some(kind.as_str()) {
            return Err(TokenError::Invalid("wrong kind".to_string()));
        }
        if self.expired.lock().contains(token) {
            return Err(TokenError::Expired);
        }
        Ok(parts)
    }
}

impl TokenAuthority for StubTokens {
    fn issue_access_token(&self, user_id: UserId, external_id: i64) -> Result<String, TokenError> {
        Ok(format!("access.{user_id}.{external_id}.{}", self.next()?))
    }

    fn issue_refresh_token(&self, user_id: UserId) -> Result<String, TokenError> {
        Ok(format!("refresh.{user_id}.{}", self.next()?))
    }

    fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let parts = self.check(token, TokenKind::Access)?;
        let invalid = || TokenError::Invalid("malformed".to_string());
        let user_id = parts.get(1).and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let external_id = parts.get(2).and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        Ok(Claims {
            user_id,
            external_id: Some(external_id),
            kind: TokenKind::Access,
            issued_at: epoch(),
            expires_at: epoch() + Duration::minutes(15),
            token_id: None,
        })
    }

    fn validate_refresh_token(&self, token: &str) -> Result<UserId, TokenError> {
        let parts = self.check(token, TokenKind::Refresh)?;
        parts
            .get(1)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| TokenError::Invalid("malformed".to_string()))
    }

    fn refresh_ttl(&self) -> Duration {
        Duration::days(7)
    }
}

/// Queue that holds tasks until the test runs them.
pub struct ManualQueue {
    tasks: Mutex<Vec<Task>>,
    capacity: usize,
}

impl ManualQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    pub async fn run_all(&self) {
        let tasks: Vec<Task> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.await;
        }
    }
}

impl TaskQueue for ManualQueue {
    fn submit(&self, task: Task) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.len() >= self.capacity {
            return false;
        }
        tasks.push(task);
        true
    }
}
