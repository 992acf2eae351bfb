//! Coffer Storage Library
//!
//! This crate provides the private object store client: start a session, make
//! sure the bucket exists, upload objects with a private ACL and hand out
//! time-limited signed GET URLs.
//!
//! `PrivateStore` implements the client once, on top of a small backend seam
//! (`Connector`, `StorageService`, `BucketHandle`). Two backends ship with it:
//! S3 and S3-compatible services through `aws-sdk-s3`, and an in-memory
//! service for tests.

pub mod client;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use client::PrivateStore;
#[cfg(feature = "storage-s3")]
pub use factory::create_store;
pub use coffer_core::{ClientConfig, StoreError, StoreResult};
#[cfg(feature = "storage-memory")]
pub use memory::MemoryService;
#[cfg(feature = "storage-s3")]
pub use s3::S3Connector;
pub use traits::{
    BucketHandle, Connector, ObjectAcl, ObjectStore, ServiceError, SignedUrl, StorageService,
};
