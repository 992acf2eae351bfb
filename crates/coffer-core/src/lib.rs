//! Coffer Core Library
//!
//! This crate provides the configuration and error types shared by the
//! object store client and the applications embedding it.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{ClientConfig, SecretString, DEFAULT_REGION};
pub use error::{ErrorMetadata, LogLevel, StoreError, StoreResult};
