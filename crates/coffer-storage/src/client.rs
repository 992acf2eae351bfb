//! Private object store client
//!
//! `PrivateStore` drives any [`Connector`] through the session lifecycle
//! (uninitialized, then started) and turns backend failures into the
//! operation-specific `StoreError` variants. Failures are logged once, here,
//! and returned unchanged to the caller; nothing is retried.

use crate::keys::{content_type_for, validate_key};
use crate::traits::{
    BucketHandle, Connector, ObjectAcl, ObjectStore, ServiceError, SignedUrl, StorageService,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SubsecRound, Utc};
use coffer_core::{ClientConfig, ErrorMetadata, LogLevel, StoreError, StoreResult};
use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Object store client bound to one configuration
///
/// The session slot is written only by [`ObjectStore::start`]; uploads and
/// signing take a read of it and then work on a shared `Arc` of the session,
/// so concurrent callers never wait on each other.
pub struct PrivateStore<C: Connector> {
    config: ClientConfig,
    connector: C,
    session: RwLock<Option<Arc<C::Service>>>,
}

impl<C: Connector> PrivateStore<C> {
    /// Create an unstarted client. No network call is made.
    pub fn new(config: ClientConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            session: RwLock::new(None),
        }
    }

    /// Create a client and start it, returning it only once the bucket exists.
    pub async fn connect(config: ClientConfig, connector: C) -> StoreResult<Self> {
        let store = Self::new(config, connector);
        store.start().await?;
        Ok(store)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn is_started(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn session(&self) -> StoreResult<Arc<C::Service>> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    /// Check for the bucket and create it when missing.
    ///
    /// A denied existence check is not conclusive (S3 answers a bare 403 both
    /// for bad credentials and for buckets of other accounts), so creation is
    /// attempted and its error decides. A creation race lost to the same
    /// account (`BucketAlreadyOwnedByYou`) counts as success. A name held by
    /// another account does not.
    async fn ensure_bucket(&self, service: &C::Service) -> StoreResult<()> {
        let bucket = self.config.bucket();

        match service.bucket_exists(bucket).await {
            Ok(true) => {
                tracing::debug!(bucket = %bucket, "Bucket already exists");
                return Ok(());
            }
            Ok(false) => {}
            Err(ServiceError::AccessDenied(msg)) => {
                tracing::debug!(
                    bucket = %bucket,
                    reason = %msg,
                    "Bucket existence check denied, attempting creation"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    endpoint = %self.config.endpoint(),
                    "Bucket existence check failed"
                );
                return Err(provision_error(e));
            }
        }

        match service.create_bucket(bucket).await {
            Ok(()) => {
                tracing::info!(bucket = %bucket, region = %self.config.region(), "Bucket created");
                Ok(())
            }
            Err(ServiceError::BucketAlreadyOwnedByYou(_)) => {
                tracing::info!(bucket = %bucket, "Bucket was created concurrently");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, bucket = %bucket, "Bucket creation failed");
                Err(provision_error(e))
            }
        }
    }

    fn resolve_bucket(
        &self,
        service: &C::Service,
    ) -> StoreResult<<C::Service as StorageService>::Bucket> {
        service.bucket(self.config.bucket()).map_err(|e| {
            tracing::error!(error = %e, bucket = %self.config.bucket(), "Bucket access failed");
            StoreError::Access(e.to_string())
        })
    }
}

/// Map a failure while provisioning the bucket during start.
fn provision_error(err: ServiceError) -> StoreError {
    match err {
        ServiceError::Unreachable(msg) => StoreError::Connection(msg),
        ServiceError::Unauthorized(msg) => StoreError::Auth(msg),
        other => StoreError::BucketProvision(other.to_string()),
    }
}

/// Signed URL lifetimes are a positive whole number of seconds.
fn whole_seconds(expires_in: Duration) -> StoreResult<u64> {
    if expires_in.as_secs() == 0 || expires_in.subsec_nanos() != 0 {
        return Err(StoreError::Signing(format!(
            "expiry must be a positive whole number of seconds, got {:?}",
            expires_in
        )));
    }
    Ok(expires_in.as_secs())
}

/// Log a request refused before any remote call, at its error's level.
fn log_rejected(err: &StoreError, operation: &'static str, key: &str) {
    match err.log_level() {
        LogLevel::Error => tracing::error!(
            error = %err,
            error_code = err.error_code(),
            operation,
            key = %key,
            "Request rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            error = %err,
            error_code = err.error_code(),
            operation,
            key = %key,
            "Request rejected"
        ),
        LogLevel::Debug => tracing::debug!(
            error = %err,
            error_code = err.error_code(),
            operation,
            key = %key,
            "Request rejected"
        ),
    }
}

#[async_trait]
impl<C: Connector> ObjectStore for PrivateStore<C> {
    async fn start(&self) -> StoreResult<()> {
        self.config.validate()?;
        let start = Instant::now();

        let existing = self.session.read().await.clone();
        let service = match existing {
            Some(service) => service,
            None => {
                let service = self.connector.connect(&self.config).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        endpoint = %self.config.endpoint(),
                        "Object store connection failed"
                    );
                    match e {
                        ServiceError::Unauthorized(msg) => StoreError::Auth(msg),
                        other => StoreError::Connection(other.to_string()),
                    }
                })?;
                Arc::new(service)
            }
        };

        self.ensure_bucket(&service).await?;

        {
            let mut slot = self.session.write().await;
            if slot.is_none() {
                *slot = Some(service);
            }
        }

        tracing::info!(
            endpoint = %self.config.endpoint(),
            bucket = %self.config.bucket(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store client started"
        );

        Ok(())
    }

    async fn upload(&self, key: &str, payload: Bytes) -> StoreResult<()> {
        let service = self
            .session()
            .await
            .inspect_err(|e| log_rejected(e, "upload", key))?;
        validate_key(key).inspect_err(|e| log_rejected(e, "upload", key))?;

        let bucket = self.resolve_bucket(&service)?;
        let size = payload.len() as u64;
        let content_type = content_type_for(key);
        let start = Instant::now();

        bucket
            .put_object(key, payload, ObjectAcl::Private, &content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket.name(),
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object upload failed"
                );
                StoreError::Write(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket.name(),
            key = %key,
            size_bytes = size,
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(())
    }

    async fn get_signed_url(&self, key: &str, expires_in: Duration) -> StoreResult<SignedUrl> {
        let service = self
            .session()
            .await
            .inspect_err(|e| log_rejected(e, "get_signed_url", key))?;
        validate_key(key).inspect_err(|e| log_rejected(e, "get_signed_url", key))?;
        let lifetime_secs =
            whole_seconds(expires_in).inspect_err(|e| log_rejected(e, "get_signed_url", key))?;

        let bucket = self.resolve_bucket(&service)?;
        let lifetime = i64::try_from(lifetime_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                StoreError::Signing(format!("expiry of {}s is out of range", lifetime_secs))
            })
            .inspect_err(|e| log_rejected(e, "get_signed_url", key))?;
        // Backends sign whole-second timestamps.
        let issued_at = Utc::now().trunc_subsecs(0);

        let url = bucket
            .sign_url(key, Method::GET, expires_in)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket.name(),
                    key = %key,
                    expires_in_secs = lifetime_secs,
                    "Signed URL generation failed"
                );
                StoreError::Signing(e.to_string())
            })?;

        tracing::debug!(
            bucket = %bucket.name(),
            key = %key,
            expires_in_secs = lifetime_secs,
            "Signed URL generated"
        );

        Ok(SignedUrl::new(url, issued_at + lifetime))
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryService;

    fn config() -> ClientConfig {
        ClientConfig::new("memory.local", "test-id", "test-secret", "unit-bucket")
    }

    #[tokio::test]
    async fn test_not_started_until_start() {
        let service = MemoryService::new();
        let store = PrivateStore::new(config(), service.clone());

        assert!(!store.is_started().await);
        assert_eq!(
            store.upload("a.txt", Bytes::from_static(b"a")).await,
            Err(StoreError::NotInitialized)
        );
        assert_eq!(
            store
                .get_signed_url("a.txt", Duration::from_secs(60))
                .await
                .unwrap_err(),
            StoreError::NotInitialized
        );

        store.start().await.unwrap();
        assert!(store.is_started().await);
        assert!(service.has_bucket("unit-bucket"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let service = MemoryService::new();
        let store = PrivateStore::new(
            ClientConfig::new("memory.local", "test-id", "", "unit-bucket"),
            service.clone(),
        );

        assert!(matches!(
            store.start().await,
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(!service.has_bucket("unit-bucket"));
    }

    #[tokio::test]
    async fn test_empty_key_has_no_remote_effect() {
        let service = MemoryService::new();
        let store = PrivateStore::connect(config(), service.clone()).await.unwrap();

        let result = store.upload("", Bytes::from_static(b"data")).await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
        assert_eq!(service.put_calls(), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_rejected_requests_are_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = PrivateStore::new(config(), MemoryService::new());
        let _ = store.upload("a.txt", Bytes::from_static(b"a")).await;
        let output = logs.text();
        assert!(output.contains("WARN"));
        assert!(output.contains("NOT_INITIALIZED"));

        store.start().await.unwrap();
        let _ = store.upload("", Bytes::from_static(b"a")).await;
        assert!(logs.text().contains("INVALID_KEY"));

        let _ = store.get_signed_url("a.txt", Duration::ZERO).await;
        let output = logs.text();
        assert!(output.contains("SIGNING_FAILED"));
        assert!(!output.contains("test-secret"));
    }

    #[tokio::test]
    async fn test_zero_expiry_is_a_signing_error() {
        let store = PrivateStore::connect(config(), MemoryService::new())
            .await
            .unwrap();

        let result = store.get_signed_url("a.txt", Duration::ZERO).await;
        assert!(matches!(result, Err(StoreError::Signing(_))));
    }

    #[tokio::test]
    async fn test_fractional_expiry_is_a_signing_error() {
        let store = PrivateStore::connect(config(), MemoryService::new())
            .await
            .unwrap();

        for expires_in in [Duration::from_millis(500), Duration::from_millis(1500)] {
            let result = store.get_signed_url("a.txt", expires_in).await;
            assert!(
                matches!(result, Err(StoreError::Signing(_))),
                "{:?} should be rejected",
                expires_in
            );
        }
    }

    #[test]
    fn test_whole_seconds() {
        assert_eq!(whole_seconds(Duration::from_secs(60)), Ok(60));
        assert!(whole_seconds(Duration::ZERO).is_err());
        assert!(whole_seconds(Duration::from_millis(500)).is_err());
        assert!(whole_seconds(Duration::from_millis(1500)).is_err());
    }

    #[test]
    fn test_provision_error_mapping() {
        assert!(matches!(
            provision_error(ServiceError::Unreachable("refused".into())),
            StoreError::Connection(_)
        ));
        assert!(matches!(
            provision_error(ServiceError::Unauthorized("bad key".into())),
            StoreError::Auth(_)
        ));
        assert!(matches!(
            provision_error(ServiceError::BucketAlreadyExists("taken".into())),
            StoreError::BucketProvision(_)
        ));
        assert!(matches!(
            provision_error(ServiceError::AccessDenied("denied".into())),
            StoreError::BucketProvision(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_sends_guessed_content_type() {
        let service = MemoryService::new();
        let store = PrivateStore::connect(config(), service.clone()).await.unwrap();

        store
            .upload("docs/report.pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        let object = service.object("unit-bucket", "docs/report.pdf").unwrap();
        assert_eq!(object.content_type, "application/pdf");
        assert_eq!(object.acl, ObjectAcl::Private);
    }

    #[tokio::test]
    async fn test_signed_url_expiry_matches_request() {
        let store = PrivateStore::connect(config(), MemoryService::new())
            .await
            .unwrap();

        let before = Utc::now().trunc_subsecs(0);
        let signed = store
            .get_signed_url("a.txt", Duration::from_secs(60))
            .await
            .unwrap();
        let after = Utc::now();

        assert!(signed.expires_at() >= before + chrono::Duration::seconds(60));
        assert!(signed.expires_at() <= after + chrono::Duration::seconds(60));
        assert_eq!(signed.expires_at().timestamp_subsec_nanos(), 0);

        // The URL's own expiry agrees with the reported one, to the second.
        let url_expires: i64 = signed
            .as_str()
            .split("expires=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .parse()
            .unwrap();
        let reported = signed.expires_at().timestamp();
        assert!(url_expires == reported || url_expires == reported + 1);
    }
}
