//! Session id → `PhoneSession` map shared by every caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use phone_core::keymap::KeyMap;
use phone_core::settings::settings;
use phone_core::store::MessageStore;

use super::session::PhoneSession;
use super::timer::{ThreadScheduler, TimeoutScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Pause after a key press that commits the letter being cycled.
    pub idle_timeout: Duration,
}

impl RegistryConfig {
    pub fn from_settings() -> Self {
        Self {
            idle_timeout: settings().timing.idle_timeout(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(1000),
        }
    }
}

/// Snapshot of the live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub oldest_age: Option<Duration>,
    pub newest_age: Option<Duration>,
    pub mean_age: Option<Duration>,
}

/// Owns one [`PhoneSession`] per session id.
///
/// Sessions are created on first reference and live until `remove`,
/// `evict_idle` or `shutdown`. Nothing expires on its own. After `shutdown`
/// callers get closed sessions that are never registered.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<PhoneSession>>>,
    keymap: Arc<KeyMap>,
    scheduler: Arc<dyn TimeoutScheduler>,
    store: Option<Arc<dyn MessageStore>>,
    config: RegistryConfig,
    shut_down: AtomicBool,
}

impl SessionRegistry {
    /// Registry over the global keypad with one background timer thread.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_scheduler(config, Arc::new(ThreadScheduler::new()))
    }

    /// The registry shuts `scheduler` down when it shuts down itself.
    pub fn with_scheduler(config: RegistryConfig, scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            keymap: KeyMap::global(),
            scheduler,
            store: None,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Use `keymap` for sessions created from now on.
    pub fn with_keymap(mut self, keymap: Arc<KeyMap>) -> Self {
        self.keymap = keymap;
        self
    }

    /// Persist every non-empty completed text to `store`.
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<PhoneSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<PhoneSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session for `session_id`, created if absent. Concurrent callers
    /// for the same unseen id all receive the same session.
    pub fn get_or_create(&self, session_id: &str) -> Arc<PhoneSession> {
        if let Some(session) = self.read().get(session_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.write();
        if self.shut_down.load(Ordering::SeqCst) {
            warn!(session_id, "registry shut down, returning a closed session");
            let session = self.new_session(session_id);
            session.close();
            return session;
        }
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| self.new_session(session_id));
        let session = Arc::clone(session);
        debug!(session_id, sessions = sessions.len(), "session resolved");
        session
    }

    fn new_session(&self, session_id: &str) -> Arc<PhoneSession> {
        PhoneSession::new(
            session_id,
            Arc::clone(&self.keymap),
            Arc::clone(&self.scheduler),
            self.config.idle_timeout,
            self.store.clone(),
        )
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<PhoneSession>> {
        self.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.read().contains_key(session_id)
    }

    /// Drop a session, cancelling its timer. Unknown ids are a no-op.
    /// Returns whether a session was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.write().remove(session_id);
        match removed {
            Some(session) => {
                session.close();
                info!(session_id, sessions = self.count(), "session removed");
                true
            }
            None => {
                debug!(session_id, "remove: no such session");
                false
            }
        }
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Active session ids, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> RegistryStats {
        let ages: Vec<Duration> = self.read().values().map(|s| s.age()).collect();
        let mean_age = if ages.is_empty() {
            None
        } else {
            let total: Duration = ages.iter().sum();
            Some(total / ages.len() as u32)
        };
        RegistryStats {
            sessions: ages.len(),
            oldest_age: ages.iter().max().copied(),
            newest_age: ages.iter().min().copied(),
            mean_age,
        }
    }

    /// Remove every session with no caller activity for at least `max_idle`.
    /// Returns the removed ids, sorted.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        {
            let mut sessions = self.write();
            sessions.retain(|id, session| {
                if session.idle_for() >= max_idle {
                    session.close();
                    evicted.push(id.clone());
                    false
                } else {
                    true
                }
            });
        }
        evicted.sort();
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), sessions = self.count(), "idle sessions evicted");
        }
        evicted
    }

    /// Close every session and stop the scheduler. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let sessions: Vec<Arc<PhoneSession>> = self.write().drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.close();
        }
        self.scheduler.shutdown();
        info!(closed = sessions.len(), "registry shut down");
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
