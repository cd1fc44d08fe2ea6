//! kibitz-core: Core library for the kibitz chess-engine session manager
//!
//! This crate keeps one UCI engine process per analysis session:
//!
//! - **Protocol** - [`protocol::encode_search`] and [`protocol::decode`] for the UCI text subset
//! - **Backends** - [`EngineBackend`] transport, [`ProcessBackend`] for real engines, [`MockBackend`] for tests
//! - **Engine handles** - [`EngineHandle`] serializes searches on one engine process
//! - **Sessions** - [`SessionRegistry`] maps session ids to handles, [`IdleReaper`] evicts idle ones
//! - **Manager** - [`EngineManager`] ties it together for hosts
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kibitz_core::{EngineManager, ManagerConfig, ProcessBackendFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ManagerConfig::default();
//!     let factory = Arc::new(ProcessBackendFactory::new(config.engine.clone()));
//!     let manager = EngineManager::new(factory, config);
//!     manager.start();
//!
//!     let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
//!     let result = manager.evaluate("game-1", fen, 17).await?;
//!     println!("best move: {:?}", result.best_move);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  EngineManager                   │
//! │  ┌────────────────────────┐  ┌────────────────┐  │
//! │  │    SessionRegistry     │◄─│   IdleReaper   │  │
//! │  │  id -> EngineHandle    │  └────────────────┘  │
//! │  └───────────┬────────────┘                      │
//! │              │ one exchange at a time            │
//! │  ┌───────────▼────────────┐                      │
//! │  │  EngineBackend (stdio) │                      │
//! │  └────────────────────────┘                      │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod session;

// Re-export key types for convenience
pub use backend::{
    BackendFactory, EngineBackend, MockBackend, MockBackendFactory, MockScript, ProcessBackend,
    ProcessBackendFactory, Transcript,
};
pub use config::{EngineConfig, ManagerConfig, ReaperConfig};
pub use engine::EngineHandle;
pub use error::{AnalysisError, EngineError};
pub use manager::EngineManager;
pub use protocol::{AnalysisResult, EngineCommand, Score};
pub use session::{IdleReaper, SessionInfo, SessionRegistry};
