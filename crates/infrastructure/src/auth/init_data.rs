//! Telegram Mini App init-data verification.
//!
//! The payload is a URL-encoded query string. Its `hash` parameter is the hex
//! HMAC-SHA256 of the data-check string (every other pair, sorted by key,
//! rendered as `key=value` and joined with `\n`) under a secret key derived
//! as HMAC-SHA256 of the bot token keyed with `"WebAppData"`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use renfound_application::ports::{Clock, CredentialError, CredentialVerifier};
use renfound_domain::ExternalIdentity;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

const SECRET_KEY_SALT: &[u8] = b"WebAppData";

/// The `user` object embedded in init data.
#[derive(Debug, Deserialize)]
struct InitDataUser {
    id: i64,
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

/// Verifies init data signed for one bot.
pub struct TelegramInitDataVerifier {
    bot_token: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TelegramInitDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramInitDataVerifier")
            .field("bot_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl TelegramInitDataVerifier {
    /// Creates a verifier for payloads signed with `bot_token`.
    pub fn new(bot_token: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bot_token: bot_token.into(),
            clock,
        }
    }

    /// Signs `fields` the way the chat client does and returns the encoded
    /// payload, `hash` included.
    ///
    /// # Errors
    /// Only if the MAC cannot be keyed, which HMAC never refuses.
    pub fn sign(&self, fields: &[(&str, &str)]) -> Result<String, CredentialError> {
        let mut pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mac = self.data_check_mac(&mut pairs)?;
        let hash = hex::encode(mac.finalize().into_bytes());

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in fields {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("hash", &hash);
        Ok(serializer.finish())
    }

    fn secret_key(&self) -> Result<Vec<u8>, CredentialError> {
        let mut mac = new_mac(SECRET_KEY_SALT)?;
        mac.update(self.bot_token.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Sorts `pairs` and feeds their data-check string into a keyed MAC.
    fn data_check_mac(&self, pairs: &mut [(String, String)]) -> Result<HmacSha256, CredentialError> {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let data_check = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut mac = new_mac(&self.secret_key()?)?;
        mac.update(data_check.as_bytes());
        Ok(mac)
    }
}

fn new_mac(key: &[u8]) -> Result<HmacSha256, CredentialError> {
    HmacSha256::new_from_slice(key).map_err(|e| CredentialError::new(format!("hmac key: {e}")))
}

fn parse_auth_date(raw: &str) -> Result<DateTime<Utc>, CredentialError> {
    let secs: i64 = raw
        .parse()
        .map_err(|_| CredentialError::new("auth_date is not a number"))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CredentialError::new("auth_date out of range"))
}

impl CredentialVerifier for TelegramInitDataVerifier {
    fn verify(&self, payload: &str, max_age: Duration) -> Result<ExternalIdentity, CredentialError> {
        let mut hash = None;
        let mut pairs = Vec::new();
        for (key, value) in form_urlencoded::parse(payload.as_bytes()) {
            if key == "hash" {
                hash = Some(value.into_owned());
            } else {
                pairs.push((key.into_owned(), value.into_owned()));
            }
        }

        let hash = hash.ok_or_else(|| CredentialError::new("hash is missing"))?;
        let expected =
            hex::decode(&hash).map_err(|_| CredentialError::new("hash is not hex"))?;

        self.data_check_mac(&mut pairs)?
            .verify_slice(&expected)
            .map_err(|_| CredentialError::new("signature mismatch"))?;

        let field = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let auth_date = parse_auth_date(
            field("auth_date").ok_or_else(|| CredentialError::new("auth_date is missing"))?,
        )?;
        if max_age > Duration::zero() && self.clock.now() - auth_date > max_age {
            return Err(CredentialError::new("init data expired"));
        }

        let user: InitDataUser = serde_json::from_str(
            field("user").ok_or_else(|| CredentialError::new("user is missing"))?,
        )
        .map_err(|e| CredentialError::new(format!("user is malformed: {e}")))?;

        let identity = ExternalIdentity::new(user.id, user.first_name, auth_date)
            .map_err(|e| CredentialError::new(e.to_string()))?
            .with_last_name(user.last_name)
            .with_username(user.username)
            .with_photo_url(user.photo_url);

        debug!(external_id = identity.external_id, "init data verified");
        Ok(identity)
    }
}
