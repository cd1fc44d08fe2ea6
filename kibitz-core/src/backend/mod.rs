//! Engine backend abstraction

pub mod mock;
pub mod process;
pub mod traits;

// Re-export key types for convenience
pub use mock::{MockBackend, MockBackendFactory, MockScript, Transcript};
pub use process::{ProcessBackend, ProcessBackendFactory};
pub use traits::{BackendFactory, EngineBackend};
