//! Scripted in-memory engine for testing
//!
//! MockBackend speaks enough UCI to stand in for a real engine: it answers
//! the handshake, replies to every `go` with a scripted search, and records
//! everything it sends and receives in a shared [`Transcript`] so tests can
//! assert on ordering.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{BackendFactory, EngineBackend};
use crate::error::EngineError;

/// Reply used when nothing else is scripted
pub const DEFAULT_REPLY: [&str; 2] = ["info depth 1 score cp 20 pv e2e4 e7e5", "bestmove e2e4"];

/// Ordered log of one mock engine's traffic
///
/// Commands received are recorded as `> line`, replies as `< line`.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    /// Every entry so far
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Commands received, without the direction marker
    pub fn commands(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix("> ").map(str::to_string))
            .collect()
    }
}

/// Behaviour shared by every engine a [`MockBackendFactory`] creates
#[derive(Debug, Clone)]
pub struct MockScript {
    /// Lines emitted for each `go`
    pub reply: Vec<String>,
    /// Simulated search time before the first reply line
    pub delay: Duration,
    /// 1-based search on which the engine dies without answering
    pub crash_on_search: Option<usize>,
    /// Never answer `go`
    pub hang: bool,
    /// Refuse to start at all
    pub fail_spawn: bool,
    /// Panic while shutting down, after `quit` is recorded
    pub panic_on_shutdown: bool,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            reply: DEFAULT_REPLY.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            crash_on_search: None,
            hang: false,
            fail_spawn: false,
            panic_on_shutdown: false,
        }
    }
}

/// Mock implementation of EngineBackend
pub struct MockBackend {
    script: MockScript,
    transcript: Transcript,
    pending: VecDeque<String>,
    searching: bool,
    searches: usize,
    running: bool,
}

impl MockBackend {
    /// Create a mock engine following `script`
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            transcript: Transcript::default(),
            pending: VecDeque::new(),
            searching: false,
            searches: 0,
            running: true,
        }
    }

    /// Shared view of this engine's traffic
    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    fn respond(&mut self, line: &str) {
        let command = line.split_whitespace().next().unwrap_or_default();
        match command {
            "uci" => {
                self.pending.push_back("id name MockFish".to_string());
                self.pending.push_back("uciok".to_string());
            }
            "isready" => self.pending.push_back("readyok".to_string()),
            "go" => {
                self.searches += 1;
                if self.script.crash_on_search == Some(self.searches) {
                    self.running = false;
                    return;
                }
                if self.script.hang {
                    return;
                }
                self.searching = true;
                self.pending.extend(self.script.reply.iter().cloned());
            }
            "quit" => self.running = false,
            _ => {}
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(MockScript::default())
    }
}

#[async_trait]
impl EngineBackend for MockBackend {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        // Give other tasks a chance to run, like a real pipe write would
        tokio::task::yield_now().await;

        if !self.running {
            return Err(EngineError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        self.transcript.push(format!("> {}", line));
        self.respond(line);
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>, EngineError> {
        if self.searching && !self.script.delay.is_zero() {
            tokio::time::sleep(self.script.delay).await;
        }
        self.searching = false;

        match self.pending.pop_front() {
            Some(line) => {
                self.transcript.push(format!("< {}", line));
                Ok(Some(line))
            }
            None if !self.running => Ok(None),
            // A running engine with nothing to say blocks the reader
            None => std::future::pending().await,
        }
    }

    fn exit_code(&mut self) -> Option<i32> {
        if self.running { None } else { Some(0) }
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    fn kill(&mut self) {
        self.transcript.push("killed".to_string());
        self.running = false;
        self.pending.clear();
    }

    async fn shutdown(&mut self, _grace: Duration) {
        if self.running {
            self.transcript.push("> quit".to_string());
            self.running = false;
        }
        self.pending.clear();

        if self.script.panic_on_shutdown {
            panic!("mock engine panicked during shutdown");
        }
    }
}

/// Factory that creates MockBackends and remembers what it created
#[derive(Default)]
pub struct MockBackendFactory {
    script: MockScript,
    spawned: AtomicUsize,
    transcripts: Mutex<HashMap<String, Vec<Transcript>>>,
}

impl MockBackendFactory {
    /// Create a factory with the default script
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with a custom script
    pub fn with_script(script: MockScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Number of engines started so far
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Number of engines started for one session
    pub fn spawn_count_for(&self, session_id: &str) -> usize {
        self.transcripts
            .lock()
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Transcript of the most recent engine started for `session_id`
    pub fn transcript(&self, session_id: &str) -> Option<Transcript> {
        self.transcripts
            .lock()
            .get(session_id)
            .and_then(|t| t.last().cloned())
    }
}

impl BackendFactory for MockBackendFactory {
    fn spawn(&self, session_id: &str) -> Result<Box<dyn EngineBackend>, EngineError> {
        if self.script.fail_spawn {
            return Err(EngineError::NotFound("mockfish".to_string()));
        }

        let backend = MockBackend::new(self.script.clone());
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .push(backend.transcript());
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_is_answered() {
        let mut backend = MockBackend::default();
        backend.send_line("uci").await.unwrap();
        backend.send_line("isready").await.unwrap();

        assert_eq!(backend.read_line().await.unwrap().as_deref(), Some("id name MockFish"));
        assert_eq!(backend.read_line().await.unwrap().as_deref(), Some("uciok"));
        assert_eq!(backend.read_line().await.unwrap().as_deref(), Some("readyok"));
    }

    #[tokio::test]
    async fn go_emits_scripted_reply() {
        let mut backend = MockBackend::default();
        backend.send_line("position fen 8/8/8/8/8/8/8/8 w - - 0 1").await.unwrap();
        backend.send_line("go depth 3").await.unwrap();

        assert_eq!(
            backend.read_line().await.unwrap().as_deref(),
            Some(DEFAULT_REPLY[0])
        );
        assert_eq!(
            backend.read_line().await.unwrap().as_deref(),
            Some(DEFAULT_REPLY[1])
        );
    }

    #[tokio::test]
    async fn crash_ends_output() {
        let mut backend = MockBackend::new(MockScript {
            crash_on_search: Some(1),
            ..Default::default()
        });
        backend.send_line("go depth 1").await.unwrap();

        assert_eq!(backend.read_line().await.unwrap(), None);
        assert!(!backend.is_running());
        assert!(backend.send_line("go depth 1").await.is_err());
    }

    #[tokio::test]
    async fn transcript_records_both_directions() {
        let mut backend = MockBackend::default();
        let transcript = backend.transcript();

        backend.send_line("go depth 1").await.unwrap();
        backend.read_line().await.unwrap();

        let entries = transcript.entries();
        assert_eq!(entries[0], "> go depth 1");
        assert!(entries[1].starts_with("< info"));
        assert_eq!(transcript.commands(), vec!["go depth 1"]);
    }

    #[tokio::test]
    async fn shutdown_stops_engine() {
        let mut backend = MockBackend::default();
        backend.shutdown(Duration::from_millis(10)).await;
        assert!(!backend.is_running());
        assert_eq!(backend.exit_code(), Some(0));
    }

    #[tokio::test]
    #[should_panic(expected = "panicked during shutdown")]
    async fn scripted_shutdown_panic() {
        let mut backend = MockBackend::new(MockScript {
            panic_on_shutdown: true,
            ..Default::default()
        });
        backend.shutdown(Duration::from_millis(10)).await;
    }

    #[test]
    fn factory_tracks_spawns_per_session() {
        let factory = MockBackendFactory::new();
        factory.spawn("a").unwrap();
        factory.spawn("a").unwrap();
        factory.spawn("b").unwrap();

        assert_eq!(factory.spawn_count(), 3);
        assert_eq!(factory.spawn_count_for("a"), 2);
        assert_eq!(factory.spawn_count_for("b"), 1);
        assert!(factory.transcript("c").is_none());
    }

    #[test]
    fn failing_factory_reports_not_found() {
        let factory = MockBackendFactory::with_script(MockScript {
            fail_spawn: true,
            ..Default::default()
        });
        assert!(matches!(factory.spawn("a"), Err(EngineError::NotFound(_))));
        assert_eq!(factory.spawn_count(), 0);
    }
}
