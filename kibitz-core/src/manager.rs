//! EngineManager: the session-manager API hosts talk to
//!
//! Wires the registry and the idle reaper together. Hosts call
//! [`EngineManager::evaluate`] with a session id and never see engine
//! handles directly.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::BackendFactory;
use crate::config::ManagerConfig;
use crate::error::{AnalysisError, EngineError};
use crate::protocol::AnalysisResult;
use crate::session::{IdleReaper, SessionInfo, SessionRegistry};

pub struct EngineManager {
    registry: Arc<SessionRegistry>,
    config: ManagerConfig,
    shutdown: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl EngineManager {
    /// Create a manager; call [`start`](Self::start) to begin reaping idle sessions
    pub fn new(factory: Arc<dyn BackendFactory>, config: ManagerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(factory, config.engine.clone()));
        Self {
            registry,
            config,
            shutdown: CancellationToken::new(),
            reaper: Mutex::new(None),
        }
    }

    /// Spawn the idle reaper. Calling it again is a no-op.
    pub fn start(&self) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let task = IdleReaper::new(Arc::clone(&self.registry), self.config.reaper)
            .spawn(self.shutdown.clone());
        *reaper = Some(task);
    }

    /// Evaluate `position` to `depth` on the session's engine
    ///
    /// Starts the engine on first use. If the engine fails, it is evicted
    /// and the next call for the session gets a fresh one.
    pub async fn evaluate(
        &self,
        session_id: &str,
        position: &str,
        depth: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        if session_id.trim().is_empty() {
            return Err(AnalysisError::InvalidArgument(
                "session id must not be empty".to_string(),
            ));
        }
        // Reject bad input before an engine is started for it
        crate::protocol::encode_search(position, depth)?;

        if self.shutdown.is_cancelled() {
            return Err(EngineError::Closed.into());
        }

        let handle = self.registry.get_or_create(session_id).await?;

        match handle.evaluate(position, depth).await {
            Err(AnalysisError::EngineUnavailable(e)) => {
                warn!(session_id = %session_id, error = %e, "Evaluation failed, dropping engine");
                self.registry.evict(session_id, &handle).await;
                Err(AnalysisError::EngineUnavailable(e))
            }
            other => other,
        }
    }

    /// Dispose the session's engine; unknown ids are ignored
    pub async fn remove_session(&self, session_id: &str) {
        if !self.registry.remove(session_id).await {
            debug!(session_id = %session_id, "No such session to remove");
        }
    }

    /// Current sessions, ordered by id
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.list_sessions().await
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop the reaper and dispose every engine
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let reaper = self.reaper.lock().take();
        if let Some(task) = reaper
            && let Err(e) = task.await
        {
            warn!(error = %e, "Idle reaper task failed");
        }

        self.registry.clear().await;
        info!("Engine manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackendFactory, MockScript};

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn create_test_manager(script: MockScript) -> (EngineManager, Arc<MockBackendFactory>) {
        let factory = Arc::new(MockBackendFactory::with_script(script));
        let manager = EngineManager::new(factory.clone(), ManagerConfig::default());
        (manager, factory)
    }

    #[tokio::test]
    async fn evaluate_starts_engine_on_first_use() {
        let (manager, factory) = create_test_manager(MockScript::default());

        let result = manager.evaluate("s1", START, 12).await.unwrap();

        assert_eq!(result.best_move.as_deref(), Some("e2e4"));
        assert_eq!(factory.spawn_count(), 1);
        assert_eq!(manager.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_input_never_spawns() {
        let (manager, factory) = create_test_manager(MockScript::default());

        for (session, position, depth) in [("", START, 5), ("s1", "  ", 5), ("s1", START, 0)] {
            let result = manager.evaluate(session, position, depth).await;
            assert!(matches!(result, Err(AnalysisError::InvalidArgument(_))));
        }
        assert_eq!(factory.spawn_count(), 0);
    }

    #[tokio::test]
    async fn missing_engine_is_unavailable() {
        let (manager, _) = create_test_manager(MockScript {
            fail_spawn: true,
            ..Default::default()
        });

        let result = manager.evaluate("s1", START, 5).await;

        assert!(matches!(
            result,
            Err(AnalysisError::EngineUnavailable(EngineError::NotFound(_)))
        ));
        assert!(manager.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn failed_engine_is_evicted() {
        let (manager, _) = create_test_manager(MockScript {
            crash_on_search: Some(1),
            ..Default::default()
        });

        let result = manager.evaluate("s1", START, 5).await;

        assert!(matches!(result, Err(AnalysisError::EngineUnavailable(_))));
        assert!(manager.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn remove_session_is_idempotent() {
        let (manager, _) = create_test_manager(MockScript::default());
        manager.evaluate("s1", START, 5).await.unwrap();

        manager.remove_session("s1").await;
        manager.remove_session("s1").await;
        manager.remove_session("never-existed").await;

        assert!(manager.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_reaper_and_disposes() {
        let (manager, _) = create_test_manager(MockScript::default());
        manager.start();
        manager.start();
        manager.evaluate("s1", START, 5).await.unwrap();
        let handle = manager.registry().get_or_create("s1").await.unwrap();

        manager.shutdown().await;

        assert!(handle.is_closed());
        assert!(manager.sessions().await.is_empty());
        assert!(manager.reaper.lock().is_none());
    }

    #[tokio::test]
    async fn evaluate_after_shutdown_is_unavailable() {
        let (manager, factory) = create_test_manager(MockScript::default());
        manager.shutdown().await;

        let result = manager.evaluate("s1", START, 5).await;

        assert!(matches!(
            result,
            Err(AnalysisError::EngineUnavailable(EngineError::Closed))
        ));
        assert_eq!(factory.spawn_count(), 0);
    }
}
