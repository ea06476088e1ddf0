//! BLOBi: a thin facade over blob storage.
//!
//! A [`Blobi`] bundles a [`StorageClientResolver`] with the blob, container
//! and metadata services built on it. Build one from a [`StorageConfig`] and
//! a backend, or from a runtime config file:
//!
//! ```toml
//! [blob_store]
//! type = "azure_blob"          # or "memory"
//! connection_string = "DefaultEndpointsProtocol=https;AccountName=...;AccountKey=..."
//! ```

use std::{path::Path, sync::Arc};

use anyhow::Context as _;

pub use blobi_blobstore::{
    runtime_config::DEFAULT_STORE_TYPE, services, Blob, BlobContainerService, BlobItem,
    BlobMetadataService, BlobProperties, BlobService, BlobStoreConfig, ConfigError,
    ConnectionString, Container, ContainerProperties, ContainerPropertiesAndBlobs,
    ContainerTarget, CopyOperation, Download, MakeBlobStore, Metadata, NameKind,
    PublicAccessType, Result, SnapshotInfo, StorageAuth, StorageBackend, StorageClientResolver,
    StorageConfig, StorageError, StoreTypeResolver, UploadInfo,
};
pub use blobi_blobstore_azure::{AzureBackend, AzureBlobStore};
pub use blobi_blobstore_memory::{MemoryBackend, MemoryBlobStore};
pub use blobi_telemetry::init as init_logging;

/// Entry point bundling the storage services for one account.
///
/// Cloning is cheap; clones share the configuration and backend.
#[derive(Clone)]
pub struct Blobi {
    resolver: StorageClientResolver,
    blobs: BlobService,
    containers: BlobContainerService,
    metadata: BlobMetadataService,
}

impl Blobi {
    /// Creates the services for `config` on top of `backend`.
    pub fn new(config: StorageConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let resolver = StorageClientResolver::new(config, backend);
        Self {
            blobs: BlobService::new(resolver.clone()),
            containers: BlobContainerService::new(resolver.clone()),
            metadata: BlobMetadataService::new(resolver.clone()),
            resolver,
        }
    }

    /// Creates services backed by Azure Blob Storage.
    pub fn azure(config: StorageConfig) -> anyhow::Result<Self> {
        let backend = AzureBlobStore::new().make_store(&config)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Creates services for a parsed `[blob_store]` table.
    pub fn from_runtime_config(config: BlobStoreConfig) -> anyhow::Result<Self> {
        let backend = store_type_resolver()?.resolve_config(&config)?;
        tracing::info!(store_type = %config.type_, "configured blob store");
        Ok(Self::new(config.storage, backend))
    }

    /// Parses a runtime config from TOML text. Environment variables are not consulted.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        Self::from_runtime_config(BlobStoreConfig::from_toml_str(toml)?)
    }

    /// Loads a runtime config file, then applies the `BLOBI_*` environment overrides.
    pub fn from_runtime_config_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = BlobStoreConfig::from_file(path)?
            .with_env_overrides()
            .with_context(|| format!("could not apply environment to {}", path.display()))?;
        Self::from_runtime_config(config)
    }

    pub fn blobs(&self) -> &BlobService {
        &self.blobs
    }

    pub fn containers(&self) -> &BlobContainerService {
        &self.containers
    }

    pub fn metadata(&self) -> &BlobMetadataService {
        &self.metadata
    }

    pub fn resolver(&self) -> &StorageClientResolver {
        &self.resolver
    }

    pub fn config(&self) -> &StorageConfig {
        self.resolver.config()
    }
}

/// Returns a resolver with every built-in store type registered.
pub fn store_type_resolver() -> anyhow::Result<StoreTypeResolver> {
    let mut resolver = StoreTypeResolver::new();
    resolver.register_store_type(AzureBlobStore::new())?;
    resolver.register_store_type(MemoryBlobStore::new())?;
    Ok(resolver)
}
