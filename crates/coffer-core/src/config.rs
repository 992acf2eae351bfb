//! Configuration module
//!
//! `ClientConfig` describes one object store session: where the service lives,
//! which credentials to present and which bucket to keep objects in. It is
//! supplied programmatically; loading it from the environment or from files is
//! left to the embedding application.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Credential material that must never be printed.
///
/// `Debug` and `Display` both render `***`; the raw value is only reachable
/// through [`SecretString::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Object store client configuration
///
/// Immutable once constructed: fields are private and only readable through
/// getters. The `with_*` setters consume and return the config so it can be
/// finished in a single expression before being handed to a client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    endpoint: String,
    access_key_id: String,
    access_key_secret: SecretString,
    bucket: String,
    region: String,
    force_path_style: bool,
    // Informational only, never used to build access URLs.
    reference_url: Option<String>,
}

impl ClientConfig {
    /// Create a configuration with the default region and path-style addressing.
    ///
    /// # Arguments
    /// * `endpoint` - Service address, e.g. "https://oss.example.com" or "localhost:9000"
    /// * `access_key_id` - Public half of the credential pair
    /// * `access_key_secret` - Secret half of the credential pair
    /// * `bucket` - Bucket that holds every object written by the client
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<SecretString>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            force_path_style: true,
            reference_url: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    pub fn with_reference_url(mut self, reference_url: impl Into<String>) -> Self {
        self.reference_url = Some(reference_url.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &SecretString {
        &self.access_key_secret
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    pub fn reference_url(&self) -> Option<&str> {
        self.reference_url.as_deref()
    }

    /// Check that every required field is populated.
    ///
    /// Only presence is checked here. Whether the endpoint is reachable and the
    /// credentials are accepted is decided by the service when a session starts.
    pub fn validate(&self) -> StoreResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(StoreError::InvalidConfig("endpoint must be set".to_string()));
        }

        if self.access_key_id.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "access key id must be set".to_string(),
            ));
        }

        if self.access_key_secret.is_empty() {
            return Err(StoreError::InvalidConfig(
                "access key secret must be set".to_string(),
            ));
        }

        if self.bucket.trim().is_empty() {
            return Err(StoreError::InvalidConfig("bucket must be set".to_string()));
        }

        if self.region.trim().is_empty() {
            return Err(StoreError::InvalidConfig("region must not be empty".to_string()));
        }

        Ok(())
    }
}
