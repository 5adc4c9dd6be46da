//! JWT token authority.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets. The
//! `type` claim is checked as well, so a token only validates against the
//! secret and the validator it was issued for.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use renfound_application::ports::{Clock, TokenAuthority, TokenError};
use renfound_domain::{Claims, TokenKind, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token lifetime used when none is configured.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::minutes(15);

/// Refresh token lifetime used when none is configured.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::days(7);

/// Longest lifetime accepted for either token class.
pub const MAX_TOKEN_TTL: Duration = Duration::days(3650);

/// Rejected token settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenSettingsError {
    /// A signing secret was empty.
    #[error("{0} secret must not be empty")]
    EmptySecret(&'static str),

    /// Both token classes would share a key.
    #[error("access and refresh secrets must differ")]
    SharedSecret,
}

/// Secrets and lifetimes for [`JwtTokenAuthority`].
#[derive(Clone)]
pub struct TokenSettings {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSettings {
    /// Creates settings with the default lifetimes.
    ///
    /// # Errors
    /// Fails if either secret is empty or both are the same.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Result<Self, TokenSettingsError> {
        let access_secret = access_secret.into();
        let refresh_secret = refresh_secret.into();
        if access_secret.is_empty() {
            return Err(TokenSettingsError::EmptySecret("access"));
        }
        if refresh_secret.is_empty() {
            return Err(TokenSettingsError::EmptySecret("refresh"));
        }
        if access_secret == refresh_secret {
            return Err(TokenSettingsError::SharedSecret);
        }
        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        })
    }

    /// Overrides the lifetimes. Missing or non-positive values keep the
    /// defaults.
    #[must_use]
    pub fn with_ttls(mut self, access: Option<Duration>, refresh: Option<Duration>) -> Self {
        if let Some(ttl) = access.filter(|d| *d > Duration::zero()) {
            self.access_ttl = ttl;
        }
        if let Some(ttl) = refresh.filter(|d| *d > Duration::zero()) {
            self.refresh_ttl = ttl;
        }
        self
    }

    /// Access token lifetime.
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}

/// Claim set as it appears on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_id: Option<i64>,
    #[serde(rename = "type")]
    kind: TokenKind,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<Uuid>,
}

impl WireClaims {
    fn into_claims(self) -> Result<Claims, TokenError> {
        Ok(Claims {
            user_id: self.user_id,
            external_id: self.external_id,
            kind: self.kind,
            issued_at: timestamp(self.iat)?,
            expires_at: timestamp(self.exp)?,
            token_id: self.jti,
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, TokenError> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenError::Invalid("timestamp out of range".to_string()))
}

/// [`TokenAuthority`] backed by `jsonwebtoken`.
pub struct JwtTokenAuthority {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtTokenAuthority {
    /// Creates an authority that reads time from `clock`.
    pub fn new(settings: TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access_encoding: EncodingKey::from_secret(settings.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_secret.as_bytes()),
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            validation,
            clock,
        }
    }

    fn sign(&self, claims: &WireClaims, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn check(&self, token: &str, key: &DecodingKey, kind: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<WireClaims>(token, key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        if data.claims.kind != kind {
            return Err(TokenError::Invalid(format!(
                "expected {kind} token, got {}",
                data.claims.kind
            )));
        }
        data.claims.into_claims()
    }
}

impl TokenAuthority for JwtTokenAuthority {
    fn issue_access_token(&self, user_id: UserId, external_id: i64) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = WireClaims {
            user_id,
            external_id: Some(external_id),
            kind: TokenKind::Access,
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
            jti: None,
        };
        self.sign(&claims, &self.access_encoding)
    }

    fn issue_refresh_token(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = WireClaims {
            user_id,
            external_id: None,
            kind: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: expiry(now, self.refresh_ttl)?,
            jti: Some(Uuid::new_v4()),
        };
        self.sign(&claims, &self.refresh_encoding)
    }

    fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.check(token, &self.access_decoding, TokenKind::Access)?;
        if claims.external_id.is_none() {
            return Err(TokenError::Invalid("access token without external id".to_string()));
        }
        Ok(claims)
    }

    fn validate_refresh_token(&self, token: &str) -> Result<UserId, TokenError> {
        self.check(token, &self.refresh_decoding, TokenKind::Refresh)
            .map(|claims| claims.user_id)
    }

    fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}
