//! Credential verification and token signing adapters.

mod init_data;
mod jwt;

pub use init_data::TelegramInitDataVerifier;
pub use jwt::{
    DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, JwtTokenAuthority, MAX_TOKEN_TTL, TokenSettings,
    TokenSettingsError,
};
