//! Engine process handles

mod handle;

pub use handle::EngineHandle;
