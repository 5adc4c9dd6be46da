//! Renfound Server - HTTP front end for the authentication service
//!
//! Wires configuration, storage, the worker pool and the auth flows into an
//! axum router and runs it until a shutdown signal arrives.

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod reaper;
pub mod routes;
pub mod state;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use renfound_application::ports::{Clock, RepositoryError, SessionRepository, UserRepository};
use renfound_application::{AuthOrchestrator, AuthSettings, PublicError};
use renfound_infrastructure::persistence::redacted_url;
use renfound_infrastructure::{
    InMemoryStore, JwtTokenAuthority, PgStore, ShutdownMode, SystemClock,
    TelegramInitDataVerifier, WorkerPool,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

pub use config::{Settings, SettingsError};
pub use error::ApiError;
pub use state::AppState;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Startup or runtime failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration is unusable.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The database could not be reached or prepared.
    #[error("database: {0}")]
    Database(#[from] RepositoryError),

    /// Binding or serving failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "request handler panicked");
    ApiError::Public(PublicError::Internal).into_response()
}

/// Builds the router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id,
        )
    });

    routes::api_routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(trace)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

enum Storage {
    Postgres(Arc<PgStore>),
    Memory(Arc<InMemoryStore>),
}

impl Storage {
    async fn open(settings: &Settings) -> Result<Self, ServerError> {
        let Some(db) = settings.database_settings() else {
            warn!("database.url is not set; users and sessions are kept in memory");
            return Ok(Self::Memory(Arc::new(InMemoryStore::new())));
        };
        info!(url = %redacted_url(&db.url), "connecting to postgres");
        let store = PgStore::connect(&db).await?;
        store.ensure_schema().await?;
        Ok(Self::Postgres(Arc::new(store)))
    }

    fn users(&self) -> Arc<dyn UserRepository> {
        match self {
            Self::Postgres(store) => store.clone(),
            Self::Memory(store) => store.clone(),
        }
    }

    fn sessions(&self) -> Arc<dyn SessionRepository> {
        match self {
            Self::Postgres(store) => store.clone(),
            Self::Memory(store) => store.clone(),
        }
    }

    async fn close(&self) {
        if let Self::Postgres(store) = self {
            store.close().await;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

/// Runs the service until ctrl-c or SIGTERM, then drains background work.
///
/// # Errors
/// Fails on invalid settings, an unreachable database or a bind failure.
pub async fn run_server(settings: Settings) -> Result<(), ServerError> {
    let addr = settings.socket_addr()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let storage = Storage::open(&settings).await?;
    let users = storage.users();
    let sessions = storage.sessions();

    let pool = Arc::new(WorkerPool::start(settings.worker_pool_settings()));
    let verifier = TelegramInitDataVerifier::new(settings.telegram.bot_token.as_str(), clock.clone());
    let tokens = JwtTokenAuthority::new(settings.token_settings()?, clock.clone());
    let auth = AuthOrchestrator::new(
        users.clone(),
        sessions.clone(),
        Arc::new(verifier),
        Arc::new(tokens),
        pool.clone(),
        clock.clone(),
    )
    .with_settings(AuthSettings {
        credential_max_age: settings.credential_max_age(),
    });

    let (stop_reaper, reaper_stop) = watch::channel(false);
    let reaper = settings.reap_interval().map(|every| {
        reaper::spawn_session_reaper(sessions.clone(), clock.clone(), every, reaper_stop)
    });

    let app = router(AppState::new(auth, users, sessions))
        .into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "renfound server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    stop_reaper.send_replace(true);
    if let Some(handle) = reaper
        && let Err(e) = handle.await
    {
        error!(error = %e, "session reaper failed");
    }

    let timeout = settings.shutdown_timeout();
    if tokio::time::timeout(timeout, pool.shutdown(ShutdownMode::Drain))
        .await
        .is_err()
    {
        warn!(timeout_secs = timeout.as_secs(), "worker pool did not drain in time");
        pool.shutdown(ShutdownMode::Immediate).await;
    }

    storage.close().await;
    info!("renfound server stopped");
    served.map_err(ServerError::from)
}
