//! EngineHandle: one engine process behind a per-session lock
//!
//! The UCI protocol has no request ids, so a handle lets exactly one
//! `position` + `go` exchange run at a time and reads it through to
//! `bestmove` before the next caller may write.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::backend::EngineBackend;
use crate::config::EngineConfig;
use crate::error::{AnalysisError, EngineError};
use crate::protocol::{self, AnalysisResult, EngineCommand};

/// Handle to one running engine
///
/// Cloning is not supported; share it through `Arc`. Callers queue on an
/// async mutex, which is fair, so evaluations for one session run in the
/// order they arrived.
pub struct EngineHandle {
    session_id: String,
    backend: Mutex<Box<dyn EngineBackend>>,
    last_used: parking_lot::Mutex<Instant>,
    created_at: DateTime<Utc>,
    searches: AtomicU64,
    busy: AtomicBool,
    closed: CancellationToken,
    disposed: AtomicBool,
    search_timeout: Option<Duration>,
    shutdown_grace: Duration,
}

/// Closes the handle if an exchange is dropped before reaching `bestmove`
///
/// Once a search has been sent, its reply lines are still coming; a later
/// caller would read them as its own.
struct ExchangeGuard<'a> {
    handle: &'a EngineHandle,
    finished: bool,
}

impl<'a> ExchangeGuard<'a> {
    fn begin(handle: &'a EngineHandle) -> Self {
        handle.busy.store(true, Ordering::SeqCst);
        Self {
            handle,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        self.handle.busy.store(false, Ordering::SeqCst);
        if !self.finished {
            self.handle.closed.cancel();
        }
    }
}

impl EngineHandle {
    /// Wrap a freshly spawned backend and send the handshake
    ///
    /// The handshake is written without waiting for `uciok`/`readyok`;
    /// engines queue commands until they are ready, and the replies are
    /// skipped by the first search's reader.
    pub async fn start(
        session_id: impl Into<String>,
        mut backend: Box<dyn EngineBackend>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let session_id = session_id.into();

        let mut handshake = vec![EngineCommand::Uci];
        handshake.extend(
            config
                .options
                .iter()
                .map(|(name, value)| EngineCommand::SetOption {
                    name: name.clone(),
                    value: value.clone(),
                }),
        );
        handshake.push(EngineCommand::IsReady);

        for command in &handshake {
            if let Err(e) = backend.send_line(&command.to_string()).await {
                backend.kill();
                return Err(e);
            }
        }

        debug!(session_id = %session_id, "Engine handshake sent");

        Ok(Self {
            session_id,
            backend: Mutex::new(backend),
            last_used: parking_lot::Mutex::new(Instant::now()),
            created_at: Utc::now(),
            searches: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            closed: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            search_timeout: config.search_timeout,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Session this engine belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// When the handle was created (wall clock)
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time an evaluation was requested
    pub fn last_used(&self) -> Instant {
        *self.last_used.lock()
    }

    /// Time since last use, measured at `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used())
    }

    /// Number of searches completed
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::SeqCst)
    }

    /// Whether a search is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Whether the handle can no longer be used
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// Run one fixed-depth search and decode its reply
    ///
    /// Fails with `InvalidArgument` before touching the engine when the
    /// request is malformed, and with `EngineUnavailable` when the engine
    /// exits, times out, or the handle is closed while waiting.
    pub async fn evaluate(
        &self,
        position: &str,
        depth: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        let commands = protocol::encode_search(position, depth)?;

        // Waiting in line counts as use, so queued sessions are not reaped
        self.touch();

        let mut backend = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(EngineError::Closed.into()),
            guard = self.backend.lock() => guard,
        };

        self.touch();

        let guard = ExchangeGuard::begin(self);
        let exchange = Self::exchange(backend.as_mut(), &commands);

        let outcome = tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(EngineError::Closed),
            result = with_timeout(self.search_timeout, exchange) => result,
        };

        match outcome {
            Ok(lines) => {
                guard.finish();
                self.searches.fetch_add(1, Ordering::SeqCst);
                trace!(session_id = %self.session_id, lines = lines.len(), "Search reply received");

                let result = protocol::decode(&lines);
                if result.is_incomplete() {
                    debug!(session_id = %self.session_id, "Engine reply had no best move");
                }
                Ok(result)
            }
            Err(e) => {
                if matches!(e, EngineError::Timeout(_)) {
                    warn!(session_id = %self.session_id, error = %e, "Engine hung, killing it");
                    backend.kill();
                } else {
                    warn!(session_id = %self.session_id, error = %e, "Engine exchange failed");
                }
                // Dropping the unfinished guard closes the handle
                drop(guard);
                Err(e.into())
            }
        }
    }

    /// Write the search commands and collect reply lines through `bestmove`
    async fn exchange(
        backend: &mut dyn EngineBackend,
        commands: &[EngineCommand],
    ) -> Result<Vec<String>, EngineError> {
        for command in commands {
            backend.send_line(&command.to_string()).await?;
        }

        let mut lines = Vec::new();
        loop {
            match backend.read_line().await? {
                Some(line) => {
                    let done = protocol::is_terminal(&line);
                    lines.push(line);
                    if done {
                        return Ok(lines);
                    }
                }
                None => {
                    return Err(EngineError::ProcessExited {
                        code: backend.exit_code(),
                    });
                }
            }
        }
    }

    /// Shut the engine down
    ///
    /// Aborts any in-flight search, sends `quit`, and kills the process if
    /// it is still running after the grace period. Safe to call more than
    /// once and never fails.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed.cancel();

        let mut backend = self.backend.lock().await;
        backend.shutdown(self.shutdown_grace).await;

        debug!(
            session_id = %self.session_id,
            searches = self.searches(),
            "Engine disposed"
        );
    }
}

/// Apply an optional deadline to an engine operation
async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(EngineError::Timeout(limit))),
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockScript, Transcript};
    use std::sync::Arc;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    async fn start_with(script: MockScript, config: &EngineConfig) -> (EngineHandle, Transcript) {
        let backend = MockBackend::new(script);
        let transcript = backend.transcript();
        let handle = EngineHandle::start("s1", Box::new(backend), config)
            .await
            .unwrap();
        (handle, transcript)
    }

    async fn start_default() -> (EngineHandle, Transcript) {
        start_with(MockScript::default(), &EngineConfig::default()).await
    }

    // ==================== Handshake Tests ====================

    #[tokio::test]
    async fn start_sends_handshake() {
        let (_handle, transcript) = start_default().await;
        assert_eq!(transcript.commands(), vec!["uci", "isready"]);
    }

    #[tokio::test]
    async fn start_sends_options_between_uci_and_isready() {
        let config = EngineConfig {
            options: vec![
                ("Threads".to_string(), "2".to_string()),
                ("Hash".to_string(), "64".to_string()),
            ],
            ..EngineConfig::default()
        };
        let (_handle, transcript) = start_with(MockScript::default(), &config).await;

        assert_eq!(
            transcript.commands(),
            vec![
                "uci",
                "setoption name Threads value 2",
                "setoption name Hash value 64",
                "isready",
            ]
        );
    }

    // ==================== Evaluate Tests ====================

    #[tokio::test]
    async fn evaluate_returns_decoded_result() {
        let (handle, transcript) = start_default().await;

        let result = handle.evaluate(START, 10).await.unwrap();

        assert_eq!(result.cp(), Some(20));
        assert_eq!(result.best_move.as_deref(), Some("e2e4"));
        assert_eq!(result.pv, vec!["e2e4", "e7e5"]);
        assert_eq!(handle.searches(), 1);

        let commands = transcript.commands();
        assert_eq!(commands[2], format!("position fen {}", START));
        assert_eq!(commands[3], "go depth 10");
    }

    #[tokio::test]
    async fn evaluate_rejects_invalid_input_without_io() {
        let (handle, transcript) = start_default().await;

        let result = handle.evaluate(START, 0).await;
        assert!(matches!(result, Err(AnalysisError::InvalidArgument(_))));
        let result = handle.evaluate("", 10).await;
        assert!(matches!(result, Err(AnalysisError::InvalidArgument(_))));

        assert_eq!(transcript.commands().len(), 2);
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn evaluate_refreshes_last_used() {
        let (handle, _) = start_default().await;
        let before = handle.last_used();

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.evaluate(START, 1).await.unwrap();

        assert!(handle.last_used() > before);
    }

    #[tokio::test]
    async fn crash_reports_engine_unavailable_and_closes() {
        let script = MockScript {
            crash_on_search: Some(1),
            ..Default::default()
        };
        let (handle, _) = start_with(script, &EngineConfig::default()).await;

        let result = handle.evaluate(START, 5).await;

        assert!(matches!(
            result,
            Err(AnalysisError::EngineUnavailable(EngineError::ProcessExited { .. }))
        ));
        assert!(handle.is_closed());

        let again = handle.evaluate(START, 5).await;
        assert!(matches!(
            again,
            Err(AnalysisError::EngineUnavailable(EngineError::Closed))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_engine_times_out_and_is_killed() {
        let script = MockScript {
            hang: true,
            ..Default::default()
        };
        let config = EngineConfig {
            search_timeout: Some(Duration::from_secs(5)),
            ..EngineConfig::default()
        };
        let (handle, transcript) = start_with(script, &config).await;

        let result = handle.evaluate(START, 30).await;

        assert!(matches!(
            result,
            Err(AnalysisError::EngineUnavailable(EngineError::Timeout(_)))
        ));
        assert!(handle.is_closed());
        assert!(transcript.entries().contains(&"killed".to_string()));
    }

    #[tokio::test]
    async fn dropped_search_closes_handle() {
        let script = MockScript {
            delay: Duration::from_secs(60),
            ..Default::default()
        };
        let (handle, _) = start_with(script, &EngineConfig::default()).await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), handle.evaluate(START, 10)).await;
        assert!(abandoned.is_err());

        assert!(handle.is_closed());
        assert!(!handle.is_busy());
    }

    // ==================== Dispose Tests ====================

    #[tokio::test]
    async fn dispose_sends_quit_once() {
        let (handle, transcript) = start_default().await;

        handle.dispose().await;
        handle.dispose().await;

        let quits = transcript
            .commands()
            .iter()
            .filter(|c| c.as_str() == "quit")
            .count();
        assert_eq!(quits, 1);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn dispose_aborts_in_flight_search() {
        let script = MockScript {
            hang: true,
            ..Default::default()
        };
        let config = EngineConfig {
            search_timeout: None,
            ..EngineConfig::default()
        };
        let (handle, _) = start_with(script, &config).await;
        let handle = Arc::new(handle);

        let searching = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.evaluate(START, 20).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        tokio::time::timeout(Duration::from_secs(1), handle.dispose())
            .await
            .expect("dispose should not wait for the hung search");

        let result = searching.await.unwrap();
        assert!(matches!(
            result,
            Err(AnalysisError::EngineUnavailable(EngineError::Closed))
        ));
    }

    #[tokio::test]
    async fn dispose_after_crash_is_safe() {
        let script = MockScript {
            crash_on_search: Some(1),
            ..Default::default()
        };
        let (handle, _) = start_with(script, &EngineConfig::default()).await;
        let _ = handle.evaluate(START, 1).await;

        handle.dispose().await;
        assert!(handle.is_closed());
    }
}
