//! Rolegate Core - shared data model and ambient infrastructure
//!
//! Error types, configuration, logging and the session records every other
//! rolegate crate builds on

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
