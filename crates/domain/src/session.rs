//! Sessions backing refresh-token validity.
//!
//! A refresh token is only honoured while a session row with that exact token
//! exists. Rotation, logout and account deletion all revoke by deleting rows;
//! nothing is ever marked as expired in place.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SessionId, UserId};

/// Informational client metadata captured at login/refresh time.
///
/// Never used for authorization decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// `User-Agent` header as sent by the client.
    pub user_agent: Option<String>,
    /// Source address of the request.
    pub ip_address: Option<String>,
}

impl ClientInfo {
    /// Builds client info, mapping empty strings to `None`.
    #[must_use]
    pub fn new(user_agent: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            user_agent: user_agent.filter(|s| !s.is_empty()),
            ip_address: ip_address.filter(|s| !s.is_empty()),
        }
    }
}

/// Durable record binding a live refresh token to its user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Row id.
    pub id: SessionId,
    /// Owning user. Rows are removed when the user is deleted.
    pub user_id: UserId,
    /// The refresh token this row vouches for. Unique across rows.
    pub refresh_token: String,
    /// Client metadata.
    pub client: ClientInfo,
    /// When the refresh token stops being valid.
    pub expires_at: DateTime<Utc>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for a freshly issued refresh token. A lifetime past
    /// the representable range saturates.
    #[must_use]
    pub fn new(
        user_id: UserId,
        refresh_token: impl Into<String>,
        client: ClientInfo,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            refresh_token: refresh_token.into(),
            client,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session has outlived its refresh token.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("refresh_token", &"<redacted>")
            .field("client", &self.client)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_info_drops_empty_strings() {
        let info = ClientInfo::new(Some(String::new()), Some("1.2.3.4".to_string()));
        assert_eq!(info.user_agent, None);
        assert_eq!(info.ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session::new(
            UserId::generate(),
            "rt",
            ClientInfo::default(),
            Duration::minutes(5),
            now,
        );
        assert_eq!(session.expires_at, now + Duration::minutes(5));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::minutes(5)));
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let session = Session::new(
            UserId::generate(),
            "rt",
            ClientInfo::default(),
            Duration::MAX,
            Utc::now(),
        );
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_debug_redacts_refresh_token() {
        let session = Session::new(
            UserId::generate(),
            "super-secret-token",
            ClientInfo::default(),
            Duration::days(7),
            Utc::now(),
        );
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
