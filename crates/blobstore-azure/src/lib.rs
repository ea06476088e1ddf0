mod store;

use blobi_blobstore::{MakeBlobStore, StorageConfig};

pub use store::AzureBackend;

/// A blob store that uses Azure Blob Storage as the backend.
#[derive(Default)]
pub struct AzureBlobStore {
    _priv: (),
}

impl AzureBlobStore {
    /// Creates a new `AzureBlobStore`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MakeBlobStore for AzureBlobStore {
    const RUNTIME_CONFIG_TYPE: &'static str = "azure_blob";

    type Backend = AzureBackend;

    fn make_store(&self, config: &StorageConfig) -> anyhow::Result<Self::Backend> {
        // Fail at startup rather than on the first request.
        config.resolve_auth()?;
        Ok(AzureBackend::new())
    }
}
