//! EngineBackend trait and related types
//!
//! The backend abstraction separates the line-oriented conversation with an
//! engine from how the engine is hosted: a real child process in production,
//! a scripted in-memory engine in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::EngineError;

/// Line transport to one running engine
///
/// Implementations are driven by a single owner at a time; the engine
/// handle wraps them in a mutex.
#[async_trait]
pub trait EngineBackend: Send {
    /// Write one command line (without trailing newline)
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError>;

    /// Read the next reply line, or `None` once the engine's output ends
    async fn read_line(&mut self) -> Result<Option<String>, EngineError>;

    /// Exit code if the engine has already exited
    fn exit_code(&mut self) -> Option<i32>;

    /// Whether the engine is still running
    fn is_running(&mut self) -> bool;

    /// Terminate immediately without waiting for the engine
    fn kill(&mut self);

    /// Ask the engine to quit, wait up to `grace`, then force-terminate
    ///
    /// Never fails; problems are logged.
    async fn shutdown(&mut self, grace: Duration);
}

/// Factory for engine backends
///
/// Enables dependency injection of backend implementations.
pub trait BackendFactory: Send + Sync {
    /// Launch a new engine for `session_id`
    fn spawn(&self, session_id: &str) -> Result<Box<dyn EngineBackend>, EngineError>;
}
