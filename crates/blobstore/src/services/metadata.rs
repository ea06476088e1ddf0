use tracing::instrument;

use super::{merge_metadata, wrap, MergePolicy};
use crate::{
    error::{Result, StorageError},
    models::{Metadata, PublicAccessType},
    StorageClientResolver,
};

/// Reads and writes blob metadata.
///
/// | operation              | existing key            |
/// |------------------------|-------------------------|
/// | `append_metadata`      | fails, nothing written  |
/// | `update_blob_metadata` | value overwritten       |
/// | `set_blob_metadata`    | whole set replaced      |
#[derive(Clone)]
pub struct BlobMetadataService {
    resolver: StorageClientResolver,
}

impl BlobMetadataService {
    pub fn new(resolver: StorageClientResolver) -> Self {
        Self { resolver }
    }

    /// Adds `metadata` to the blob's existing metadata, failing with
    /// [`StorageError::DuplicateMetadataKey`] if any key is already present.
    #[instrument(name = "blobi.append_metadata", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn append_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        self.merge(
            "append_metadata",
            container,
            blob,
            metadata,
            MergePolicy::Reject,
        )
        .await
    }

    /// Adds `metadata` to the blob's existing metadata, overwriting values of
    /// keys that are already present.
    #[instrument(name = "blobi.update_blob_metadata", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn update_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        self.merge(
            "update_blob_metadata",
            container,
            blob,
            metadata,
            MergePolicy::Overwrite,
        )
        .await
    }

    /// Replaces the blob's metadata with `metadata`.
    #[instrument(name = "blobi.set_blob_metadata", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn set_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        const OP: &str = "set_blob_metadata";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle
            .set_metadata(metadata)
            .await
            .map_err(wrap(OP, blob, container))
    }

    /// Returns the blob's metadata.
    #[instrument(name = "blobi.get_blob_metadata", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn get_blob_metadata(&self, container: &str, blob: &str) -> Result<Metadata> {
        const OP: &str = "get_blob_metadata";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle.metadata().await.map_err(wrap(OP, blob, container))
    }

    async fn merge(
        &self,
        operation: &'static str,
        container: &str,
        blob: &str,
        metadata: &Metadata,
        policy: MergePolicy,
    ) -> Result<()> {
        let handle = self
            .resolver
            .blob(operation, container, blob, PublicAccessType::None)
            .await?;
        let existing = handle
            .metadata()
            .await
            .map_err(wrap(operation, blob, container))?;
        let merged = merge_metadata(existing, metadata, policy).map_err(|key| {
            StorageError::DuplicateMetadataKey {
                key,
                operation,
                blob: blob.to_owned(),
                container: container.to_owned(),
            }
        })?;
        handle
            .set_metadata(&merged)
            .await
            .map_err(wrap(operation, blob, container))
    }
}
