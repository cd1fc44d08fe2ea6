//! Session registry and idle reclamation

pub mod reaper;
pub mod registry;

pub use reaper::IdleReaper;
pub use registry::{SessionInfo, SessionRegistry};
