//! Commands sent to a UCI engine

use std::fmt;

use crate::error::AnalysisError;

/// A single line written to the engine's stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Switch the engine into UCI mode
    Uci,
    /// Set an engine option (e.g. `Threads`, `Hash`)
    SetOption { name: String, value: String },
    /// Ask the engine to report `readyok` once it has processed everything
    IsReady,
    /// Load a position
    Position { fen: String },
    /// Search to a fixed depth
    GoDepth(u32),
    /// Terminate the engine
    Quit,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => f.write_str("uci"),
            EngineCommand::SetOption { name, value } => {
                write!(f, "setoption name {} value {}", name, value)
            }
            EngineCommand::IsReady => f.write_str("isready"),
            EngineCommand::Position { fen } => write!(f, "position fen {}", fen),
            EngineCommand::GoDepth(depth) => write!(f, "go depth {}", depth),
            EngineCommand::Quit => f.write_str("quit"),
        }
    }
}

/// Encode a fixed-depth search into its two protocol commands
///
/// The position is passed through verbatim; FEN syntax is the caller's
/// concern. It must still be a single non-blank line, since anything after
/// a line break would reach the engine as a separate command.
pub fn encode_search(position: &str, depth: u32) -> Result<[EngineCommand; 2], AnalysisError> {
    if depth == 0 {
        return Err(AnalysisError::InvalidArgument(
            "depth must be a positive integer".to_string(),
        ));
    }
    let fen = position.trim();
    if fen.is_empty() {
        return Err(AnalysisError::InvalidArgument(
            "position is required".to_string(),
        ));
    }
    if fen.contains(['\n', '\r']) {
        return Err(AnalysisError::InvalidArgument(
            "position must be a single line".to_string(),
        ));
    }

    Ok([
        EngineCommand::Position {
            fen: fen.to_string(),
        },
        EngineCommand::GoDepth(depth),
    ])
}
