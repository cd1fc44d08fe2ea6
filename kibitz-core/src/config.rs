//! Engine and session configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default search depth used by hosts when the caller gives none
pub const DEFAULT_DEPTH: u32 = 17;
/// How long a session may stay unused before the reaper evicts it
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// How often the reaper scans the registry
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// How long `quit` is given before the engine is killed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
/// Upper bound on a single search before the engine is considered hung
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);
/// Engine command used when none is configured
pub const DEFAULT_ENGINE: &str = "stockfish";

/// How engine processes are launched and driven
///
/// The default never looks at the environment; hosts apply their own
/// overrides on top of it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine binary, "stockfish" by default
    pub path: PathBuf,
    /// Arguments passed to the engine
    pub args: Vec<String>,
    /// `setoption` pairs sent during the handshake, in order
    pub options: Vec<(String, String)>,
    /// Bound on one search; `None` waits forever
    pub search_timeout: Option<Duration>,
    /// Time between `quit` and a forced kill
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_ENGINE),
            args: Vec::new(),
            options: Vec::new(),
            search_timeout: Some(DEFAULT_SEARCH_TIMEOUT),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Split a "command arg1 arg2" string into program and arguments
pub fn split_command(command: &str) -> (PathBuf, Vec<String>) {
    let parts: Vec<&str> = command.split_whitespace().collect();
    match parts.split_first() {
        Some((program, rest)) => (
            PathBuf::from(program),
            rest.iter().map(|s| s.to_string()).collect(),
        ),
        None => (PathBuf::from(DEFAULT_ENGINE), Vec::new()),
    }
}

/// Idle reclamation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperConfig {
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Everything an [`EngineManager`](crate::EngineManager) needs
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub engine: EngineConfig,
    pub reaper: ReaperConfig,
}
