//! In-memory storage service
//!
//! A stand-in for a real object storage service, used by tests and local
//! development. It keeps buckets and objects in process memory and behaves
//! like the remote service where the client can observe it:
//!
//! - objects written with a private ACL are refused to anonymous readers,
//! - signed URLs carry an HMAC-SHA256 signature and a unix expiry, and are
//!   verified by [`MemoryService::fetch_signed`],
//! - the last write to a key wins.
//!
//! Faults (unreachable service, revoked bucket access, failing writes or
//! signing) can be switched on to exercise every error path of the client.
//! Clones share the same state, so a test keeps one handle for inspection
//! while the client owns another.

use crate::keys::validate_bucket_name;
use crate::traits::{BucketHandle, Connector, ObjectAcl, ServiceError, StorageService};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{ClientConfig, SecretString};
use hmac::{Hmac, Mac};
use http::Method;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const URL_SCHEME: &str = "memory://";

/// Longest signed URL lifetime accepted, matching S3's seven days.
pub const MAX_SIGNED_URL_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors returned when reading objects back out of the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("access denied")]
    AccessDenied,

    #[error("signed URL expired")]
    Expired,

    #[error("signature does not match")]
    SignatureMismatch,

    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("malformed URL: {0}")]
    Malformed(String),
}

/// An object as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub acl: ObjectAcl,
    pub content_type: String,
}

#[derive(Default)]
struct MemoryState {
    buckets: HashMap<String, HashMap<String, StoredObject>>,
    credentials: Option<(String, SecretString)>,
    foreign_buckets: HashSet<String>,
    denied_buckets: HashSet<String>,
    racing_buckets: HashSet<String>,
    offline: bool,
    write_failure: Option<String>,
    signing_failure: Option<String>,
    create_bucket_calls: usize,
    put_calls: usize,
}

/// In-memory storage service
#[derive(Clone)]
pub struct MemoryService {
    state: Arc<Mutex<MemoryState>>,
    signing_key: Arc<[u8; 32]>,
}

impl MemoryService {
    /// Create an empty service that accepts any credentials.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            signing_key: Arc::new(rand::random()),
        }
    }

    /// Only accept sessions presenting this credential pair.
    pub fn with_credentials(self, access_key_id: &str, secret: impl Into<SecretString>) -> Self {
        self.state().credentials = Some((access_key_id.to_string(), secret.into()));
        self
    }

    /// Pre-create a bucket, as if it had been provisioned out of band.
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default();
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every call fail as if the endpoint could not be reached.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Mark a bucket name as owned by another account.
    pub fn claim_by_other_account(&self, bucket: &str) {
        self.state().foreign_buckets.insert(bucket.to_string());
    }

    /// Report `bucket` as missing once, then lose the creation race to
    /// another session of the same account.
    pub fn race_bucket_creation(&self, bucket: &str) {
        self.state().racing_buckets.insert(bucket.to_string());
    }

    /// Revoke this account's access to `bucket` for object operations.
    pub fn revoke_bucket_access(&self, bucket: &str) {
        self.state().denied_buckets.insert(bucket.to_string());
    }

    /// Make every subsequent write fail with `reason`.
    pub fn fail_writes(&self, reason: &str) {
        self.state().write_failure = Some(reason.to_string());
    }

    /// Make every subsequent signing request fail with `reason`.
    pub fn fail_signing(&self, reason: &str) {
        self.state().signing_failure = Some(reason.to_string());
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state().buckets.contains_key(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    pub fn create_bucket_calls(&self) -> usize {
        self.state().create_bucket_calls
    }

    pub fn put_calls(&self) -> usize {
        self.state().put_calls
    }

    /// Read an object without any signature, as an anonymous client would.
    pub fn get_public(&self, bucket: &str, key: &str) -> Result<Bytes, FetchError> {
        match self.object(bucket, key) {
            Some(object) => match object.acl {
                ObjectAcl::Private => Err(FetchError::AccessDenied),
            },
            // Anonymous callers cannot tell a missing key from a private one.
            None => Err(FetchError::AccessDenied),
        }
    }

    /// Dereference a signed URL now.
    pub fn fetch_signed(&self, url: &str) -> Result<Bytes, FetchError> {
        self.fetch_signed_at(url, Utc::now())
    }

    /// Dereference a signed URL as of `now`.
    pub fn fetch_signed_at(&self, url: &str, now: DateTime<Utc>) -> Result<Bytes, FetchError> {
        let parsed = ParsedUrl::parse(url)?;

        let provided =
            hex::decode(&parsed.signature).map_err(|_| FetchError::SignatureMismatch)?;
        self.mac(&Method::GET, &parsed.bucket, &parsed.key, parsed.expires)
            .map_err(|e| FetchError::Malformed(e.to_string()))?
            .verify_slice(&provided)
            .map_err(|_| FetchError::SignatureMismatch)?;

        if now.timestamp() > parsed.expires {
            return Err(FetchError::Expired);
        }

        self.object(&parsed.bucket, &parsed.key)
            .map(|object| object.data)
            .ok_or(FetchError::NoSuchKey(parsed.key))
    }

    fn mac(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        expires: i64,
    ) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_slice())
            .map_err(|e| ServiceError::Backend(e.to_string()))?;
        let message = format!("{}\n{}\n{}\n{}", method, bucket, key, expires);
        mac.update(message.as_bytes());
        Ok(mac)
    }

    fn check_online(state: &MemoryState) -> Result<(), ServiceError> {
        if state.offline {
            return Err(ServiceError::Unreachable(
                "connection refused by memory service".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryService {
    type Service = MemoryService;

    async fn connect(&self, config: &ClientConfig) -> Result<Self::Service, ServiceError> {
        let state = self.state();
        Self::check_online(&state)?;

        if config.endpoint().contains(char::is_whitespace) {
            return Err(ServiceError::InvalidRequest(format!(
                "malformed endpoint '{}'",
                config.endpoint()
            )));
        }

        if let Some((access_key_id, secret)) = &state.credentials {
            if access_key_id != config.access_key_id() || secret != config.access_key_secret() {
                return Err(ServiceError::Unauthorized(format!(
                    "access key '{}' rejected",
                    config.access_key_id()
                )));
            }
        }

        Ok(self.clone())
    }
}

#[async_trait]
impl StorageService for MemoryService {
    type Bucket = MemoryBucket;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ServiceError> {
        let mut state = self.state();
        Self::check_online(&state)?;

        // Like S3, a bucket of another account answers a bare denial.
        if state.foreign_buckets.contains(bucket) {
            return Err(ServiceError::AccessDenied(bucket.to_string()));
        }

        if state.racing_buckets.remove(bucket) {
            state.buckets.entry(bucket.to_string()).or_default();
            return Ok(false);
        }

        Ok(state.buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), ServiceError> {
        let mut state = self.state();
        Self::check_online(&state)?;
        state.create_bucket_calls += 1;

        validate_bucket_name(bucket).map_err(ServiceError::InvalidRequest)?;

        if state.foreign_buckets.contains(bucket) {
            return Err(ServiceError::BucketAlreadyExists(bucket.to_string()));
        }

        if state.buckets.contains_key(bucket) {
            return Err(ServiceError::BucketAlreadyOwnedByYou(bucket.to_string()));
        }

        state.buckets.insert(bucket.to_string(), HashMap::new());
        Ok(())
    }

    fn bucket(&self, bucket: &str) -> Result<Self::Bucket, ServiceError> {
        let state = self.state();
        Self::check_online(&state)?;

        if state.denied_buckets.contains(bucket) || state.foreign_buckets.contains(bucket) {
            return Err(ServiceError::AccessDenied(bucket.to_string()));
        }

        if !state.buckets.contains_key(bucket) {
            return Err(ServiceError::NoSuchBucket(bucket.to_string()));
        }

        Ok(MemoryBucket {
            service: self.clone(),
            name: bucket.to_string(),
        })
    }
}

/// Object operations on one bucket of a [`MemoryService`].
pub struct MemoryBucket {
    service: MemoryService,
    name: String,
}

#[async_trait]
impl BucketHandle for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        acl: ObjectAcl,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.service.state();
        MemoryService::check_online(&state)?;
        state.put_calls += 1;

        if let Some(reason) = &state.write_failure {
            return Err(ServiceError::Backend(reason.clone()));
        }

        if state.denied_buckets.contains(&self.name) {
            return Err(ServiceError::AccessDenied(self.name.clone()));
        }

        let objects = state
            .buckets
            .get_mut(&self.name)
            .ok_or_else(|| ServiceError::NoSuchBucket(self.name.clone()))?;

        objects.insert(
            key.to_string(),
            StoredObject {
                data: payload,
                acl,
                content_type: content_type.to_string(),
            },
        );

        Ok(())
    }

    async fn sign_url(
        &self,
        key: &str,
        method: Method,
        expires_in: Duration,
    ) -> Result<String, ServiceError> {
        {
            let state = self.service.state();
            MemoryService::check_online(&state)?;

            if let Some(reason) = &state.signing_failure {
                return Err(ServiceError::Backend(reason.clone()));
            }
        }

        if method != Method::GET {
            return Err(ServiceError::InvalidRequest(format!(
                "cannot sign {} requests",
                method
            )));
        }

        if expires_in.is_zero() || expires_in > MAX_SIGNED_URL_LIFETIME {
            return Err(ServiceError::InvalidRequest(format!(
                "expiry of {}s is outside 1s..={}s",
                expires_in.as_secs(),
                MAX_SIGNED_URL_LIFETIME.as_secs()
            )));
        }

        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = hex::encode(
            self.service
                .mac(&method, &self.name, key, expires)?
                .finalize()
                .into_bytes(),
        );

        Ok(format!(
            "{}{}/{}?expires={}&signature={}",
            URL_SCHEME,
            self.name,
            encode_key(key),
            expires,
            signature
        ))
    }
}

/// Percent-encode each path segment of a key, keeping `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

struct ParsedUrl {
    bucket: String,
    key: String,
    expires: i64,
    signature: String,
}

impl ParsedUrl {
    fn parse(url: &str) -> Result<Self, FetchError> {
        let malformed = |reason: &str| FetchError::Malformed(reason.to_string());

        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| malformed("unexpected scheme"))?;
        let (path, query) = rest
            .split_once('?')
            .ok_or_else(|| malformed("missing query"))?;
        let (bucket, encoded_key) = path
            .split_once('/')
            .ok_or_else(|| malformed("missing key"))?;

        let key = urlencoding::decode(encoded_key)
            .map_err(|e| FetchError::Malformed(e.to_string()))?
            .into_owned();

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", value)) => {
                    expires = Some(value.parse::<i64>().map_err(|_| malformed("bad expiry"))?);
                }
                Some(("signature", value)) => signature = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key,
            expires: expires.ok_or_else(|| malformed("missing expiry"))?,
            signature: signature.ok_or_else(|| malformed("missing signature"))?,
        })
    }
}
