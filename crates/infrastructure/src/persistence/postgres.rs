//! PostgreSQL store on a `sqlx` pool.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use renfound_application::ports::{RepositoryError, SessionRepository, UserRepository};
use renfound_domain::{ClientInfo, Session, SessionId, User, UserId};
use sqlx::FromRow;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, error, info};
use url::Url;
use uuid::Uuid;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id          UUID PRIMARY KEY,
    telegram_id BIGINT NOT NULL UNIQUE,
    username    TEXT,
    first_name  TEXT NOT NULL,
    last_name   TEXT,
    photo_url   TEXT,
    auth_date   TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id            UUID PRIMARY KEY,
    user_id       UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    refresh_token TEXT NOT NULL UNIQUE,
    user_agent    TEXT,
    ip_address    TEXT,
    expires_at    TIMESTAMPTZ NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions (user_id);
CREATE INDEX IF NOT EXISTS sessions_expires_at_idx ON sessions (expires_at);
";

const USER_COLUMNS: &str =
    "id, telegram_id, username, first_name, last_name, photo_url, auth_date, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token, user_agent, ip_address, expires_at, created_at, updated_at";

/// Connection pool settings.
#[derive(Clone)]
pub struct DatabaseSettings {
    /// `postgres://` connection string.
    pub url: String,
    /// Pool ceiling.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Maximum lifetime of one connection.
    pub max_lifetime: Duration,
    /// Idle time after which a connection is closed.
    pub idle_timeout: Duration,
    /// Time allowed to acquire a connection.
    pub connect_timeout: Duration,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &redacted_url(&self.url))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("max_lifetime", &self.max_lifetime)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Returns `url` with any password replaced, for logging.
#[must_use]
pub fn redacted_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                // Only fails for URLs that cannot carry credentials at all.
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}

fn map_err(error: sqlx::Error) -> RepositoryError {
    match error {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        other => RepositoryError::Storage(other.to_string()),
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    telegram_id: i64,
    username: Option<String>,
    first_name: String,
    last_name: Option<String>,
    photo_url: Option<String>,
    auth_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            external_id: row.telegram_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            photo_url: row.photo_url,
            auth_date: row.auth_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    refresh_token: String,
    user_agent: Option<String>,
    ip_address: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            refresh_token: row.refresh_token,
            client: ClientInfo::new(row.user_agent, row.ip_address),
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Both repositories over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens the pool and verifies one connection.
    ///
    /// # Errors
    /// Returns `RepositoryError::Storage` if the database is unreachable.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .max_lifetime(settings.max_lifetime)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.connect_timeout)
            .connect(&settings.url)
            .await
            .map_err(|e| {
                error!(url = %redacted_url(&settings.url), error = %e, "database connection failed");
                map_err(e)
            })?;

        info!(
            url = %redacted_url(&settings.url),
            max_connections = settings.max_connections,
            "connected to database"
        );
        Ok(Self { pool })
    }

    /// Creates the tables and indexes if they are missing.
    ///
    /// # Errors
    /// Returns `RepositoryError::Storage` if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        debug!("database schema ready");
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(user.id.as_uuid())
        .bind(user.external_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.photo_url)
        .bind(user.auth_date)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map(User::from)
            .map_err(map_err)
    }

    async fn get_user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"
        ))
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map(User::from)
        .map_err(map_err)
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET username = $1, first_name = $2, last_name = $3, photo_url = $4, \
             auth_date = $5, updated_at = $6 WHERE id = $7",
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.photo_url)
        .bind(user.auth_date)
        .bind(user.updated_at)
        .bind(user.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(session.id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(&session.refresh_token)
        .bind(&session.client.user_agent)
        .bind(&session.client.ip_address)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_session_by_token(&self, refresh_token: &str) -> Result<Session, RepositoryError> {
        sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token = $1"
        ))
        .bind(refresh_token)
        .fetch_one(&self.pool)
        .await
        .map(Session::from)
        .map_err(map_err)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use renfound_domain::ExternalIdentity;

    use super::*;

    #[test]
    fn test_redacted_url_hides_password() {
        assert_eq!(
            redacted_url("postgres://app:hunter2@db:5432/renfound"),
            "postgres://app:***@db:5432/renfound"
        );
        assert_eq!(
            redacted_url("postgres://db:5432/renfound"),
            "postgres://db:5432/renfound"
        );
        assert_eq!(redacted_url("not a url"), "<unparseable url>");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(map_err(sqlx::Error::RowNotFound), RepositoryError::NotFound));
        assert!(matches!(
            map_err(sqlx::Error::PoolTimedOut),
            RepositoryError::Storage(_)
        ));
    }

    #[test]
    fn test_settings_debug_redacts_url() {
        let settings = DatabaseSettings {
            url: "postgres://app:hunter2@db/renfound".to_string(),
            max_connections: 10,
            min_connections: 0,
            max_lifetime: Duration::from_secs(3600),
            idle_timeout: Duration::from_secs(1800),
            connect_timeout: Duration::from_secs(10),
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    /// Needs a disposable database in `RENFOUND_TEST_DATABASE_URL`.
    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_round_trip_against_postgres() {
        let url = std::env::var("RENFOUND_TEST_DATABASE_URL").unwrap();
        let store = PgStore::connect(&DatabaseSettings {
            url,
            max_connections: 2,
            min_connections: 0,
            max_lifetime: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        store.ensure_schema().await.unwrap();

        let now = Utc::now();
        let external_id = now.timestamp_micros();
        let user = User::from_identity(&ExternalIdentity::new(external_id, "Ada", now).unwrap(), now);
        store.create_user(&user).await.unwrap();
        assert!(matches!(
            store.create_user(&user).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(
            store.get_user_by_external_id(external_id).await.unwrap().id,
            user.id
        );

        let session = Session::new(
            user.id,
            format!("token-{external_id}"),
            ClientInfo::new(Some("agent".to_string()), None),
            ChronoDuration::days(1),
            now,
        );
        store.create_session(&session).await.unwrap();
        let loaded = store.get_session_by_token(&session.refresh_token).await.unwrap();
        assert_eq!(loaded.client, session.client);

        store.delete_user(user.id).await.unwrap();
        assert!(matches!(
            store.get_session_by_token(&session.refresh_token).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(!store.delete_session(session.id).await.unwrap());
        store.close().await;
    }
}
