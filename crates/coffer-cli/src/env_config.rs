//! Environment configuration for the CLI
//!
//! | variable                   | required | default     |
//! |----------------------------|----------|-------------|
//! | `COFFER_ENDPOINT`          | yes      |             |
//! | `COFFER_ACCESS_KEY_ID`     | yes      |             |
//! | `COFFER_ACCESS_KEY_SECRET` | yes      |             |
//! | `COFFER_BUCKET`            | yes      |             |
//! | `COFFER_REGION`            | no       | `us-east-1` |
//! | `COFFER_PATH_STYLE`        | no       | `true`      |
//! | `COFFER_REFERENCE_URL`     | no       |             |

use std::env;

use coffer_core::ClientConfig;

/// Load the client configuration from the process environment.
pub fn config_from_env() -> Result<ClientConfig, anyhow::Error> {
    dotenvy::dotenv().ok();
    config_from_lookup(|name| env::var(name).ok())
}

/// Build the client configuration from any variable lookup.
pub fn config_from_lookup<F>(lookup: F) -> Result<ClientConfig, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &str| {
        lookup(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} must be set", name))
    };

    let mut config = ClientConfig::new(
        required("COFFER_ENDPOINT")?,
        required("COFFER_ACCESS_KEY_ID")?,
        required("COFFER_ACCESS_KEY_SECRET")?,
        required("COFFER_BUCKET")?,
    );

    if let Some(region) = lookup("COFFER_REGION") {
        config = config.with_region(region);
    }

    if let Some(path_style) = lookup("COFFER_PATH_STYLE") {
        let path_style = path_style
            .to_lowercase()
            .parse::<bool>()
            .map_err(|_| anyhow::anyhow!("COFFER_PATH_STYLE must be true or false"))?;
        config = config.with_path_style(path_style);
    }

    if let Some(reference_url) = lookup("COFFER_REFERENCE_URL") {
        config = config.with_reference_url(reference_url);
    }

    config.validate()?;
    Ok(config)
}
