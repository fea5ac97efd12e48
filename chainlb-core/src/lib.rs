//! Chainlb Core Library
//!
//! This library provides core functionality shared by the chainlb crates including:
//! - Configuration management
//! - Error types
//! - Hex / address normalisation
//! - Fixed-period background scheduling

pub mod config;
pub mod error;
pub mod hex;
pub mod logging;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use config::model::{
    Config, ContractCacheSettings, Endpoint, HealthSettings, NodeSettings,
    SynchronisationSettings,
};
pub use error::{HexError, NodeError};
pub use logging::LogLevel;
pub use types::ContractId;
