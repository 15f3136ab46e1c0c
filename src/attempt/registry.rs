//! In-memory registry of live attempt sessions. Re-entering a test returns
//! the existing live session for that student; terminal sessions are evicted
//! by a periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration};

use crate::attempt::engine::AttemptPhase;
use crate::attempt::session::AttemptSession;
use crate::attempt::AttemptError;
use crate::core::config::AttemptSettings;
use crate::store::{AttemptStore, TestStore};

#[derive(Clone)]
pub(crate) struct AttemptRegistry {
    sessions: Arc<Mutex<HashMap<String, Arc<AttemptSession>>>>,
}

impl AttemptRegistry {
    pub(crate) fn new() -> Self {
        Self { sessions: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Returns the live session for `(test_id, user_id)`, starting one if
    /// none exists. The boolean is true when a new session was started.
    pub(crate) async fn open(
        &self,
        test_id: &str,
        user_id: &str,
        tests: &Arc<dyn TestStore>,
        attempts: &Arc<dyn AttemptStore>,
        settings: &AttemptSettings,
    ) -> Result<(Arc<AttemptSession>, bool), AttemptError> {
        let mut sessions = self.sessions.lock().await;

        for session in sessions.values() {
            if session.test().id == test_id && session.user_id() == user_id {
                if session.phase().await != AttemptPhase::Submitted {
                    return Ok((Arc::clone(session), false));
                }
            }
        }

        let session =
            AttemptSession::start(test_id, user_id, tests, Arc::clone(attempts), settings).await?;
        sessions.insert(session.id().to_string(), Arc::clone(&session));
        Ok((session, true))
    }

    pub(crate) async fn get(&self, session_id: &str) -> Option<Arc<AttemptSession>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Removes the session and cancels its schedules. An in-flight
    /// submission write still runs to completion on its own task.
    pub(crate) async fn close(&self, session_id: &str) -> bool {
        match self.sessions.lock().await.remove(session_id) {
            Some(session) => {
                session.shutdown();
                true
            }
            None => false,
        }
    }

    pub(crate) async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub(crate) async fn shutdown_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for session in sessions.values() {
            session.shutdown();
        }
        sessions.clear();
    }

    /// Evicts submitted sessions (their record of truth is the store) and
    /// `Failed` sessions nobody has retried within `failed_ttl`.
    pub(crate) async fn sweep(&self, failed_ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let mut finished = Vec::new();
        for (id, session) in sessions.iter() {
            let evict = match session.phase().await {
                AttemptPhase::Submitted => true,
                AttemptPhase::Failed => {
                    session.failed_for().is_some_and(|age| age >= failed_ttl)
                }
                _ => false,
            };
            if evict {
                finished.push(id.clone());
            }
        }
        for id in &finished {
            if let Some(session) = sessions.remove(id) {
                session.shutdown();
            }
        }
        finished.len()
    }
}

pub(crate) async fn sweep_loop(
    registry: AttemptRegistry,
    settings: AttemptSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(Duration::from_secs(settings.sweep_interval_seconds.max(1)));
    let failed_ttl = Duration::from_secs(settings.failed_session_ttl_seconds.max(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let removed = registry.sweep(failed_ttl).await;
                if removed > 0 {
                    tracing::debug!(removed, "swept finished attempt sessions");
                }
            }
        }
    }
}
