//! Token pair and decoded claims.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::UserId;

/// Access and refresh token returned to the client.
///
/// Never persisted as a unit: the access token is stateless and the refresh
/// token lives on in its session row.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Single-use credential exchanged for a new pair.
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Token class tag embedded in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived bearer token.
    Access,
    /// Rotating refresh token.
    Refresh,
}

impl TokenKind {
    /// Wire tag of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(DomainError::UnknownTokenKind(other.to_string())),
        }
    }
}

/// Decoded payload of a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject user.
    pub user_id: UserId,
    /// Platform id; only carried by access tokens.
    pub external_id: Option<i64>,
    /// Which class of token this was.
    pub kind: TokenKind,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Unique instance id; only carried by refresh tokens.
    pub token_id: Option<Uuid>,
}
