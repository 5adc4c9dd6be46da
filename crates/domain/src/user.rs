//! Users and the external identities they are created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Identity attested by the chat platform's signed init data.
///
/// Transient: produced by the credential verifier and consumed once to create
/// or refresh a [`User`]. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Platform-side numeric user id.
    pub external_id: i64,
    /// First name as shown on the platform.
    pub first_name: String,
    /// Optional last name.
    pub last_name: Option<String>,
    /// Optional public handle.
    pub username: Option<String>,
    /// Optional avatar URL.
    pub photo_url: Option<String>,
    /// When the platform signed the payload.
    pub auth_date: DateTime<Utc>,
}

impl ExternalIdentity {
    /// Creates an identity with the mandatory fields.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::IncompleteIdentity`] when the external id is not
    /// positive or the first name is blank.
    pub fn new(
        external_id: i64,
        first_name: impl Into<String>,
        auth_date: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let first_name = first_name.into();
        if external_id <= 0 {
            return Err(DomainError::IncompleteIdentity(format!(
                "external id must be positive, got {external_id}"
            )));
        }
        if first_name.trim().is_empty() {
            return Err(DomainError::IncompleteIdentity(
                "first name is empty".to_string(),
            ));
        }
        Ok(Self {
            external_id,
            first_name,
            last_name: None,
            username: None,
            photo_url: None,
            auth_date,
        })
    }

    /// Sets the last name. Blank values are treated as absent.
    #[must_use]
    pub fn with_last_name(mut self, last_name: Option<String>) -> Self {
        self.last_name = non_blank(last_name);
        self
    }

    /// Sets the username. Blank values are treated as absent.
    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = non_blank(username);
        self
    }

    /// Sets the avatar URL. Blank values are treated as absent.
    #[must_use]
    pub fn with_photo_url(mut self, photo_url: Option<String>) -> Self {
        self.photo_url = non_blank(photo_url);
        self
    }
}

/// A registered end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal id, assigned at creation.
    pub id: UserId,
    /// Platform-side id. Unique and immutable after creation.
    #[serde(rename = "telegram_id")]
    pub external_id: i64,
    /// Public handle, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// First name.
    pub first_name: String,
    /// Last name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Timestamp of the init data used for the latest login.
    pub auth_date: DateTime<Utc>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a brand-new user from a verified identity.
    #[must_use]
    pub fn from_identity(identity: &ExternalIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::generate(),
            external_id: identity.external_id,
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            photo_url: identity.photo_url.clone(),
            auth_date: identity.auth_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites every display attribute with the latest identity.
    ///
    /// Last login wins; no merging. `id`, `external_id` and `created_at` are
    /// left untouched.
    pub fn apply_identity(&mut self, identity: &ExternalIdentity, now: DateTime<Utc>) {
        self.username.clone_from(&identity.username);
        self.first_name.clone_from(&identity.first_name);
        self.last_name.clone_from(&identity.last_name);
        self.photo_url.clone_from(&identity.photo_url);
        self.auth_date = identity.auth_date;
        self.updated_at = now;
    }

    /// Display name combining first and last name.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
