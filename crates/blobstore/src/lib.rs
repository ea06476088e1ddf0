//! Blob storage services over pluggable backends.
//!
//! Callers work with container and blob names; the
//! [`StorageClientResolver`] turns a [`StorageConfig`] and a container name
//! into an authenticated handle (creating the container if it does not exist)
//! and the [`services`] forward each request to the backend, attaching the
//! operation, container and blob to any failure.

mod backend;
mod error;
mod models;
mod resolver;
pub mod runtime_config;
pub mod services;

pub use backend::{Blob, Container, ContainerTarget, StorageBackend};
pub use blobi_config::{
    ConfigError, ConnectionString, StorageAuth, StorageConfig, DEFAULT_ENDPOINTS_PROTOCOL,
    DEFAULT_ENDPOINT_SUFFIX,
};
pub use error::{NameKind, Result, StorageError};
pub use models::{
    BlobItem, BlobProperties, ContainerProperties, ContainerPropertiesAndBlobs, CopyOperation,
    Download, Metadata, PublicAccessType, SnapshotInfo, UploadInfo,
};
pub use resolver::StorageClientResolver;
pub use runtime_config::{BlobStoreConfig, MakeBlobStore, StoreTypeResolver};
pub use services::{BlobContainerService, BlobMetadataService, BlobService};
