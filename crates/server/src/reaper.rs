//! Periodic removal of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use renfound_application::ports::{Clock, SessionRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Spawns a task that sweeps expired sessions every `every` until `stop`
/// flips to `true` or its sender is dropped.
pub fn spawn_session_reaper(
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match sessions.delete_expired_sessions(clock.now()).await {
                        Ok(0) => debug!("no expired sessions"),
                        Ok(removed) => info!(removed, "expired sessions removed"),
                        Err(e) => error!(error = %e, "expired session sweep failed"),
                    }
                }
            }
        }
        debug!("session reaper stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use renfound_application::ports::UserRepository;
    use renfound_domain::{ClientInfo, ExternalIdentity, Session, User};
    use renfound_infrastructure::{InMemoryStore, SystemClock};

    use super::*;

    #[tokio::test]
    async fn test_reaper_removes_expired_sessions_and_stops() {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let now = clock.now();

        let identity = ExternalIdentity::new(42, "Neo", now).unwrap();
        let user = User::from_identity(&identity, now);
        store.create_user(&user).await.unwrap();
        let stale = Session::new(
            user.id,
            "stale",
            ClientInfo::default(),
            ChronoDuration::hours(1),
            now - ChronoDuration::hours(2),
        );
        let live = Session::new(user.id, "live", ClientInfo::default(), ChronoDuration::hours(1), now);
        store.create_session(&stale).await.unwrap();
        store.create_session(&live).await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_session_reaper(store.clone(), clock, Duration::from_millis(10), stop_rx);

        for _ in 0..100 {
            if store.session_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.session_count().await, 1);
        assert!(store.get_session_by_token("live").await.is_ok());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
