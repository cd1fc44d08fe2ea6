//! SessionRegistry: session id to engine handle
//!
//! Each id maps to a `OnceCell` slot. Concurrent first lookups for one id
//! share the slot, so the factory runs once; the map lock is only held for
//! map edits and never while an engine starts or searches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::BackendFactory;
use crate::config::EngineConfig;
use crate::engine::EngineHandle;
use crate::error::EngineError;

/// One session's engine, started at most once
#[derive(Default)]
struct Slot {
    engine: OnceCell<Arc<EngineHandle>>,
    /// Set when the session is taken out on purpose (remove, sweep, clear),
    /// as opposed to dropped after a failed start
    removed: AtomicBool,
}

impl Slot {
    fn handle(&self) -> Option<&Arc<EngineHandle>> {
        self.engine.get()
    }

    fn mark_removed(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Whole seconds since last use
    pub idle_secs: u64,
    pub searches: u64,
    pub busy: bool,
    #[serde(skip)]
    pub last_used: Instant,
}

/// Owns every live engine, keyed by session id
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Slot>>>,
    factory: Arc<dyn BackendFactory>,
    config: EngineConfig,
}

impl SessionRegistry {
    /// Create an empty registry that launches engines through `factory`
    pub fn new(factory: Arc<dyn BackendFactory>, config: EngineConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            config,
        }
    }

    /// Return the session's engine, starting one if needed
    ///
    /// A handle that has closed (crashed, timed out) is evicted and
    /// replaced. If the session is removed while its engine is still
    /// starting, the new engine is shut down and `Closed` returned. If the
    /// slot was only dropped because another caller's start failed, the
    /// lookup starts over.
    pub async fn get_or_create(&self, session_id: &str) -> Result<Arc<EngineHandle>, EngineError> {
        loop {
            let slot = self.slot(session_id).await;

            let handle = match slot.engine.get_or_try_init(|| self.start_engine(session_id)).await {
                Ok(handle) => Arc::clone(handle),
                Err(e) => {
                    self.discard_empty_slot(session_id, &slot).await;
                    return Err(e);
                }
            };

            if !self.is_current(session_id, &slot).await {
                handle.dispose().await;
                if slot.is_removed() {
                    debug!(session_id = %session_id, "Session removed while engine was starting");
                    return Err(EngineError::Closed);
                }
                debug!(session_id = %session_id, "Slot dropped after a failed start, retrying");
                continue;
            }

            if handle.is_closed() {
                debug!(session_id = %session_id, "Replacing closed engine");
                self.evict(session_id, &handle).await;
                continue;
            }

            return Ok(handle);
        }
    }

    /// Existing slot for `session_id`, or a new empty one
    async fn slot(&self, session_id: &str) -> Arc<Slot> {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }

    async fn is_current(&self, session_id: &str, slot: &Arc<Slot>) -> bool {
        self.sessions
            .read()
            .await
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn discard_empty_slot(&self, session_id: &str, slot: &Arc<Slot>) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.engine.initialized())
        {
            sessions.remove(session_id);
        }
    }

    async fn start_engine(&self, session_id: &str) -> Result<Arc<EngineHandle>, EngineError> {
        let backend = self.factory.spawn(session_id)?;
        let handle = EngineHandle::start(session_id, backend, &self.config).await?;
        info!(session_id = %session_id, "Engine session started");
        Ok(Arc::new(handle))
    }

    /// Remove a session and shut its engine down
    ///
    /// Returns whether the session existed. Unknown ids are a no-op.
    pub async fn remove(&self, session_id: &str) -> bool {
        let slot = self.sessions.write().await.remove(session_id);
        let Some(slot) = slot else {
            return false;
        };
        slot.mark_removed();

        if let Some(handle) = slot.handle() {
            handle.dispose().await;
        }
        info!(session_id = %session_id, "Session removed");
        true
    }

    /// Remove `handle` if the session still maps to it, then dispose it
    ///
    /// Returns whether the mapping was removed.
    pub async fn evict(&self, session_id: &str, handle: &Arc<EngineHandle>) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let matches = sessions
                .get(session_id)
                .and_then(|slot| slot.handle())
                .is_some_and(|current| Arc::ptr_eq(current, handle));
            if matches {
                sessions.remove(session_id);
            }
            matches
        };

        handle.dispose().await;
        if removed {
            debug!(session_id = %session_id, "Engine evicted");
        }
        removed
    }

    /// Snapshot of every started session, ordered by id
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let now = Instant::now();
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .await
            .iter()
            .filter_map(|(id, slot)| slot.handle().map(|handle| (id, handle)))
            .map(|(id, handle)| SessionInfo {
                session_id: id.clone(),
                created_at: handle.created_at(),
                idle_secs: handle.idle_for(now).as_secs(),
                searches: handle.searches(),
                busy: handle.is_busy(),
                last_used: handle.last_used(),
            })
            .collect();
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }

    /// Evict sessions idle for longer than `timeout` as of `now`
    ///
    /// Sessions with a search in flight are skipped. Returns the evicted
    /// ids.
    pub async fn sweep_idle(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let is_stale =
            |handle: &Arc<EngineHandle>| !handle.is_busy() && handle.idle_for(now) > timeout;

        let candidates: Vec<(String, Arc<EngineHandle>)> = self
            .sessions
            .read()
            .await
            .iter()
            .filter_map(|(id, slot)| slot.handle().map(|handle| (id.clone(), Arc::clone(handle))))
            .filter(|(_, handle)| is_stale(handle))
            .collect();

        if candidates.is_empty() {
            return Vec::new();
        }

        // Re-check under the write lock; a session used since the snapshot stays
        let evicted: Vec<(String, Arc<EngineHandle>)> = {
            let mut sessions = self.sessions.write().await;
            candidates
                .into_iter()
                .filter(|(id, handle)| {
                    let still_stale = sessions
                        .get(id)
                        .and_then(|slot| slot.handle())
                        .is_some_and(|current| Arc::ptr_eq(current, handle) && is_stale(current));
                    if still_stale && let Some(slot) = sessions.remove(id) {
                        slot.mark_removed();
                    }
                    still_stale
                })
                .collect()
        };

        for (id, handle) in &evicted {
            info!(
                session_id = %id,
                idle_secs = handle.idle_for(now).as_secs(),
                "Evicting idle session"
            );
        }

        let ids = evicted.iter().map(|(id, _)| id.clone()).collect();
        dispose_all(evicted).await;
        ids
    }

    /// Remove and dispose every session
    pub async fn clear(&self) {
        let drained: Vec<(String, Arc<EngineHandle>)> = self
            .sessions
            .write()
            .await
            .drain()
            .filter_map(|(id, slot)| {
                slot.mark_removed();
                slot.handle().map(|handle| (id, Arc::clone(handle)))
            })
            .collect();

        if !drained.is_empty() {
            info!(count = drained.len(), "Disposing all sessions");
        }
        dispose_all(drained).await;
    }

    /// Number of sessions in the map, including ones still starting
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Dispose handles concurrently; one failing disposal does not stop the rest
async fn dispose_all(handles: Vec<(String, Arc<EngineHandle>)>) {
    let mut tasks = JoinSet::new();
    for (_, handle) in handles {
        tasks.spawn(async move { handle.dispose().await });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Engine disposal task failed");
        }
    }
}
