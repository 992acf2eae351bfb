//! Error types module
//!
//! Every failure of the object store client is reported as a `StoreError`.
//! Variants follow the operation that failed (starting a session, resolving the
//! bucket, writing, signing) rather than the transport error underneath, so
//! callers can decide on retry policy without knowing the backend.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for caller mistakes like an empty key
    Debug,
    /// Warning level - for conditions the caller is expected to handle
    Warn,
    /// Error level - for failures reported by the storage service
    Error,
}

/// Metadata describing how an error should be treated by the caller
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "WRITE_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same call may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Bucket provisioning failed: {0}")]
    BucketProvision(String),

    #[error("Object store client is not started")]
    NotInitialized,

    #[error("Bucket access failed: {0}")]
    Access(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("URL signing failed: {0}")]
    Signing(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for object store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn store_error_static_metadata(
    err: &StoreError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        StoreError::Connection(_) => (
            "CONNECTION_FAILED",
            true,
            Some("Check the endpoint address and network reachability"),
            LogLevel::Error,
        ),
        StoreError::Auth(_) => (
            "AUTH_FAILED",
            false,
            Some("Check the access key id and secret"),
            LogLevel::Error,
        ),
        StoreError::BucketProvision(_) => (
            "BUCKET_PROVISION_FAILED",
            true,
            Some("Check the bucket name and the permissions of the access key"),
            LogLevel::Error,
        ),
        StoreError::NotInitialized => (
            "NOT_INITIALIZED",
            false,
            Some("Start the client before using it"),
            LogLevel::Warn,
        ),
        StoreError::Access(_) => (
            "BUCKET_ACCESS_FAILED",
            true,
            Some("Check that the access key can still reach the bucket"),
            LogLevel::Error,
        ),
        StoreError::Write(_) => (
            "WRITE_FAILED",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        StoreError::Signing(_) => (
            "SIGNING_FAILED",
            false,
            Some("Check the requested expiry and the credentials"),
            LogLevel::Error,
        ),
        StoreError::InvalidKey(_) => (
            "INVALID_KEY",
            false,
            Some("Use a non-empty object key"),
            LogLevel::Debug,
        ),
        StoreError::InvalidConfig(_) => (
            "INVALID_CONFIG",
            false,
            Some("Fill in every required configuration field"),
            LogLevel::Debug,
        ),
    }
}

impl ErrorMetadata for StoreError {
    fn error_code(&self) -> &'static str {
        store_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        store_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        store_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        store_error_static_metadata(self).3
    }
}
