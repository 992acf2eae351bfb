//! Coffer CLI: private uploads and signed download links.
//!
//! Reads COFFER_ENDPOINT, COFFER_ACCESS_KEY_ID, COFFER_ACCESS_KEY_SECRET and
//! COFFER_BUCKET (plus optional COFFER_REGION, COFFER_PATH_STYLE,
//! COFFER_REFERENCE_URL) from the environment or a `.env` file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use coffer_cli::{config_from_env, init_tracing, key_for, read_payload};
use coffer_storage::{create_store, ObjectStore};
use serde::Serialize;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "coffer", about = "Private object storage CLI")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and create the configured bucket if it does not exist
    EnsureBucket,
    /// Upload a file with private access control
    Upload {
        /// Path to the file to upload
        file: std::path::PathBuf,
        /// Object key (defaults to the file name)
        #[arg(long)]
        key: Option<String>,
        /// Also print a signed URL valid for this many seconds
        #[arg(long, value_name = "SECONDS")]
        sign: Option<u64>,
    },
    /// Print a signed GET URL for an object
    Sign {
        /// Object key
        key: String,
        /// Lifetime of the URL in seconds
        #[arg(long, default_value = "3600")]
        expires: u64,
    },
}

#[derive(Serialize)]
struct SignedOutput {
    key: String,
    url: String,
    expires_at: String,
}

#[derive(Serialize)]
struct UploadOutput {
    key: String,
    size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    signed: Option<SignedOutput>,
}

fn print_output<T: Serialize>(
    json: bool,
    value: &T,
    plain: impl FnOnce(),
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = config_from_env()?;
    let bucket = config.bucket().to_string();
    tracing::debug!(bucket = %bucket, endpoint = %config.endpoint(), "Configuration loaded");
    let store = create_store(config)
        .await
        .context("Failed to start object store client")?;

    match cli.command {
        Commands::EnsureBucket => {
            let output = serde_json::json!({ "bucket": bucket, "ready": true });
            print_output(cli.json, &output, || println!("Bucket {} is ready", bucket))?;
        }
        Commands::Upload { file, key, sign } => {
            let key = key_for(&file, key)?;
            let payload = read_payload(&file).await?;
            let size_bytes = payload.len();

            store
                .upload(&key, payload)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;

            let signed = match sign {
                Some(seconds) => {
                    let signed = store
                        .get_signed_url(&key, Duration::from_secs(seconds))
                        .await
                        .context("Failed to sign URL")?;
                    Some(SignedOutput {
                        key: key.clone(),
                        url: signed.to_string(),
                        expires_at: signed.expires_at().to_rfc3339(),
                    })
                }
                None => None,
            };

            let output = UploadOutput {
                key,
                size_bytes,
                signed,
            };
            print_output(cli.json, &output, || {
                println!("Uploaded {} ({} bytes)", output.key, output.size_bytes);
                if let Some(signed) = &output.signed {
                    println!("{}", signed.url);
                }
            })?;
        }
        Commands::Sign { key, expires } => {
            let signed = store
                .get_signed_url(&key, Duration::from_secs(expires))
                .await
                .context("Failed to sign URL")?;

            let output = SignedOutput {
                key,
                url: signed.to_string(),
                expires_at: signed.expires_at().to_rfc3339(),
            };
            print_output(cli.json, &output, || println!("{}", output.url))?;
        }
    }

    Ok(())
}
