//! Coffer CLI support: configuration loading and tracing setup.
//!
//! The storage client never reads the environment itself. This crate is the
//! embedding application that does: it reads `COFFER_*` variables (after
//! loading a `.env` file when present) and builds a `ClientConfig` from them.

pub mod env_config;

pub use env_config::{config_from_env, config_from_lookup};

use anyhow::Context;
use bytes::Bytes;
use std::path::Path;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file to upload into memory.
pub async fn read_payload(path: &Path) -> anyhow::Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(data))
}

/// Object key for an uploaded file: the explicit key, or the file name.
pub fn key_for(path: &Path, key: Option<String>) -> anyhow::Result<String> {
    if let Some(key) = key {
        return Ok(key);
    }

    path.file_name()
        .and_then(|name| name.to_str())
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a key from {}", path.display()))
}
