//! ncl-common — Shared types, errors, and configuration used across all ncl crates.

pub mod error;
pub mod run_config;

// Re-export commonly used types
pub use error::{NclError, Result};
pub use run_config::{
    AuditConfig, ColumnConfig, DataConfig, ModelConfig, NeutralizationConfig, OutputConfig,
    RunConfig,
};
