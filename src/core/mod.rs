//! Core Atlana domain models, configuration, and the workflow execution engine.
pub mod config;
pub mod crypt;
pub mod error;
pub mod types;
pub mod workflow;

pub use config::EngineConfig;
pub use crypt::Crypt;
pub use error::{EngineError, EngineResult};
pub use types::*;
