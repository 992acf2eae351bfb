#[cfg(feature = "storage-s3")]
use crate::S3Connector;
use crate::{ClientConfig, ObjectStore, PrivateStore, StoreResult};
use std::sync::Arc;

/// Connect to the S3-compatible service described by `config`.
///
/// The returned store is already started: the session is open and the bucket
/// exists.
#[cfg(feature = "storage-s3")]
pub async fn create_store(config: ClientConfig) -> StoreResult<Arc<dyn ObjectStore>> {
    let store = PrivateStore::connect(config, S3Connector).await?;
    Ok(Arc::new(store))
}

/// Create a started store backed by a fresh in-memory service (for tests).
#[cfg(all(test, feature = "storage-memory"))]
pub async fn create_test_store() -> StoreResult<(Arc<dyn ObjectStore>, crate::MemoryService)> {
    let service = crate::MemoryService::new();
    let config = ClientConfig::new("memory.local", "test-id", "test-secret", "coffer-test");
    let store: Arc<dyn ObjectStore> =
        Arc::new(PrivateStore::connect(config, service.clone()).await?);
    Ok((store, service))
}
