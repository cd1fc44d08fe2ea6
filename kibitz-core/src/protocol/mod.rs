//! UCI protocol codec
//!
//! Encodes search requests into the engine's newline-delimited command
//! protocol and decodes its reply lines into an [`AnalysisResult`].

pub mod command;
pub mod reply;
pub mod result;

pub use command::{EngineCommand, encode_search};
pub use reply::{decode, is_terminal};
pub use result::{AnalysisResult, Score};
