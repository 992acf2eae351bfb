#![allow(dead_code)]

use coffer_storage::{ClientConfig, MemoryService, PrivateStore};

pub const TEST_BUCKET: &str = "assets-test";
pub const TEST_ACCESS_KEY_ID: &str = "AKIDTEST";
pub const TEST_SECRET: &str = "test-secret-value";

pub type TestStore = PrivateStore<MemoryService>;

/// Configuration pointing at the scenario endpoint with the test credentials.
pub fn test_config() -> ClientConfig {
    ClientConfig::new(
        "store.example.com",
        TEST_ACCESS_KEY_ID,
        TEST_SECRET,
        TEST_BUCKET,
    )
    .with_reference_url("https://cdn.example.com/assets")
}

/// In-memory service that only accepts the test credentials.
pub fn test_service() -> MemoryService {
    MemoryService::new().with_credentials(TEST_ACCESS_KEY_ID, TEST_SECRET)
}

/// Unstarted client plus a handle on the service behind it.
pub fn unstarted_store() -> (TestStore, MemoryService) {
    let service = test_service();
    let store = PrivateStore::new(test_config(), service.clone());
    (store, service)
}

/// Started client plus a handle on the service behind it.
pub async fn started_store() -> (TestStore, MemoryService) {
    let service = test_service();
    let store = PrivateStore::connect(test_config(), service.clone())
        .await
        .expect("Failed to start test store");
    (store, service)
}
