//! Labellerr SDK Core
//!
//! Submit-and-poll engine, instrumentation layer and the collaborator operations
//! that make up the client surface.

pub mod client;
pub mod config;
pub mod instrument;
pub mod jobs;
pub mod projects;
pub mod transport;
pub mod upload;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
