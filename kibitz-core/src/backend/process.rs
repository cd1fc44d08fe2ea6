//! Child-process backend
//!
//! ProcessBackend runs the engine as a child process and talks to it over
//! piped stdin/stdout. This is the production backend.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::traits::{BackendFactory, EngineBackend};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::protocol::EngineCommand;

/// Keeps a console window from flashing up for every engine on Windows
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Backend that owns one engine child process
pub struct ProcessBackend {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ProcessBackend {
    /// Build the command for spawning the engine
    ///
    /// Extracted so command construction can be checked without spawning.
    pub fn build_command(config: &EngineConfig) -> Command {
        let mut cmd = Command::new(&config.path);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }

    /// Spawn the engine described by `config`
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = Self::build_command(config).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(config.path.display().to_string())
            } else {
                EngineError::SpawnFailed(e)
            }
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            EngineError::Io(std::io::Error::other("engine stdin was not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::Io(std::io::Error::other("engine stdout was not captured"))
        })?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// OS process id, if still known
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl EngineBackend for ProcessBackend {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.stdin.write_all(buf.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>, EngineError> {
        Ok(self.stdout.next_line().await?)
    }

    fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "Engine kill failed, process probably gone");
        }
    }

    async fn shutdown(&mut self, grace: Duration) {
        if !self.is_running() {
            return;
        }

        // Polite quit first
        if let Err(e) = self.send_line(&EngineCommand::Quit.to_string()).await {
            debug!(error = %e, "Could not send quit to engine");
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(status = ?status, "Engine exited after quit");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Error waiting for engine to exit");
            }
            Err(_) => {
                debug!(grace = ?grace, "Engine ignored quit, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Failed to kill engine");
                }
            }
        }
    }
}

/// Factory for creating ProcessBackend instances
pub struct ProcessBackendFactory {
    config: EngineConfig,
}

impl ProcessBackendFactory {
    /// Create a new factory with the given config
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Resolve the engine binary through PATH, like a shell would
    ///
    /// Returns the resolved location so hosts can report it at startup.
    pub fn locate(&self) -> Result<std::path::PathBuf, EngineError> {
        which::which(&self.config.path)
            .map_err(|_| EngineError::NotFound(self.config.path.display().to_string()))
    }
}

impl BackendFactory for ProcessBackendFactory {
    fn spawn(&self, session_id: &str) -> Result<Box<dyn EngineBackend>, EngineError> {
        let backend = ProcessBackend::spawn(&self.config)?;
        debug!(
            session_id = %session_id,
            pid = ?backend.pid(),
            engine = %self.config.path.display(),
            "Engine process spawned"
        );
        Ok(Box::new(backend))
    }
}
