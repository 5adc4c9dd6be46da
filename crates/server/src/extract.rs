//! Request extractors.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use renfound_application::ports::TokenError;
use renfound_application::PublicError;
use renfound_domain::{ClientInfo, UserId};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, FieldError};
use crate::state::AppState;

/// The caller behind a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    /// Internal user id from the token.
    pub user_id: UserId,
    /// Platform id from the token.
    pub external_id: i64,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::Unauthorized("missing auth header"))?;
        let token = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized("invalid auth header format"))?;

        let claims = state.auth.tokens().validate_access_token(token).map_err(|e| {
            debug!(error = %e, "access token rejected");
            match e {
                TokenError::Expired => ApiError::Public(PublicError::TokenExpired),
                _ => ApiError::Public(PublicError::InvalidToken),
            }
        })?;
        let external_id = claims
            .external_id
            .ok_or(ApiError::Public(PublicError::InvalidToken))?;

        Ok(Self {
            user_id: claims.user_id,
            external_id,
        })
    }
}

/// User agent and source address of the caller. Never rejects.
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    if let Some(forwarded) = header_value(parts, "x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    header_value(parts, "x-real-ip")
}

impl<S> FromRequestParts<S> for RequestClient
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = header_value(parts, USER_AGENT.as_str());
        Ok(Self(ClientInfo::new(user_agent, client_ip(parts))))
    }
}

/// Checks required fields after deserialization.
pub trait Validate {
    /// Returns every field that failed.
    ///
    /// # Errors
    /// The non-empty list of failures.
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Fails with [`FieldError::required`] when `value` is blank.
pub fn require(errors: &mut Vec<FieldError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::required(field));
    }
}

/// JSON body that has passed [`Validate`].
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate().map_err(ApiError::Validation)?;
        Ok(Self(value))
    }
}
