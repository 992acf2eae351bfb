//! Storage abstraction traits
//!
//! Two seams live here. `ObjectStore` is what callers use: start a session,
//! upload privately, hand out signed URLs. `Connector`, `StorageService` and
//! `BucketHandle` are what a backend provides: the four remote operations the
//! client delegates to (bucket existence, bucket creation, put with ACL and
//! URL signing).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{ClientConfig, StoreResult};
use http::Method;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Access-control class applied to written objects.
///
/// Private is the only class this crate writes; there is no public variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Private,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
        }
    }
}

impl fmt::Display for ObjectAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-limited URL granting GET access to one private object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    url: String,
    expires_at: DateTime<Utc>,
}

impl SignedUrl {
    pub fn new(url: String, expires_at: DateTime<Utc>) -> Self {
        Self { url, expires_at }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Moment after which the service refuses the URL.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn into_string(self) -> String {
        self.url
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Failures reported by a storage service backend.
///
/// The client translates these into `StoreError` depending on which operation
/// failed, so the same service failure can surface as different store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("credentials rejected: {0}")]
    Unauthorized(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("bucket already owned by you: {0}")]
    BucketAlreadyOwnedByYou(String),

    #[error("bucket name already taken: {0}")]
    BucketAlreadyExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Object store client capability set
///
/// Any implementation honoring these three operations is substitutable, which
/// lets applications swap the S3-backed client for the in-memory one in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a session and make sure the configured bucket exists.
    ///
    /// Calling `start` on a started client re-checks the bucket and succeeds.
    async fn start(&self) -> StoreResult<()>;

    /// Write `payload` under `key` with private access control.
    ///
    /// Overwrites any previous object under the same key. No URL is returned:
    /// private objects are only reachable through [`ObjectStore::get_signed_url`].
    async fn upload(&self, key: &str, payload: Bytes) -> StoreResult<()>;

    /// Generate a GET URL for `key` valid for `expires_in` from now.
    ///
    /// The object is not required to exist; a URL for a missing key fails only
    /// when fetched. Every call signs a fresh URL.
    async fn get_signed_url(&self, key: &str, expires_in: Duration) -> StoreResult<SignedUrl>;
}

/// Opens authenticated sessions against a storage service.
#[async_trait]
pub trait Connector: Send + Sync {
    type Service: StorageService;

    /// Establish a session using the endpoint and credentials in `config`.
    async fn connect(&self, config: &ClientConfig) -> Result<Self::Service, ServiceError>;
}

/// An open session with a storage service.
#[async_trait]
pub trait StorageService: Send + Sync + 'static {
    type Bucket: BucketHandle;

    /// `AccessDenied` means the answer is unknown: the bucket may belong to
    /// another account.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ServiceError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), ServiceError>;

    /// Resolve a handle for object operations inside `bucket`.
    fn bucket(&self, bucket: &str) -> Result<Self::Bucket, ServiceError>;
}

/// Object operations scoped to one bucket.
#[async_trait]
pub trait BucketHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        acl: ObjectAcl,
        content_type: &str,
    ) -> Result<(), ServiceError>;

    /// Sign a URL allowing `method` on `key` for `expires_in`.
    async fn sign_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> Result<String, ServiceError>;
}
