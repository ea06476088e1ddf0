use tracing::instrument;

use super::{merge_metadata, wrap, MergePolicy};
use crate::{
    error::{Result, StorageError},
    models::{BlobItem, ContainerProperties, ContainerPropertiesAndBlobs, Metadata, PublicAccessType},
    StorageClientResolver,
};

/// Container-level operations.
#[derive(Clone)]
pub struct BlobContainerService {
    resolver: StorageClientResolver,
}

impl BlobContainerService {
    pub fn new(resolver: StorageClientResolver) -> Self {
        Self { resolver }
    }

    /// Creates the container if it does not exist. Returns whether it was created.
    #[instrument(name = "blobi.create_container", skip_all, fields(container = %container, access = %access), err)]
    pub async fn create_container(
        &self,
        container: &str,
        access: PublicAccessType,
    ) -> Result<bool> {
        let (_, created) = self
            .resolver
            .ensure_container("create_container", container, access, &Metadata::new())
            .await?;
        Ok(created)
    }

    /// Creates the container with `metadata` if it does not exist. The
    /// metadata of an existing container is left alone. Returns whether it was created.
    #[instrument(name = "blobi.create_container_with_metadata", skip_all, fields(container = %container, access = %access), err)]
    pub async fn create_container_with_metadata(
        &self,
        container: &str,
        metadata: &Metadata,
        access: PublicAccessType,
    ) -> Result<bool> {
        let (_, created) = self
            .resolver
            .ensure_container("create_container_with_metadata", container, access, metadata)
            .await?;
        Ok(created)
    }

    /// Deletes the container. Returns `false` if it did not exist.
    #[instrument(name = "blobi.delete_container", skip_all, fields(container = %container), err)]
    pub async fn delete_container(&self, container: &str) -> Result<bool> {
        const OP: &str = "delete_container";
        let handle = self.resolver.container_ref(container)?;
        handle
            .delete_if_exists()
            .await
            .map_err(wrap(OP, "", container))
    }

    #[instrument(name = "blobi.get_container_properties", skip_all, fields(container = %container), err)]
    pub async fn get_container_properties(&self, container: &str) -> Result<ContainerProperties> {
        const OP: &str = "get_container_properties";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        handle.properties().await.map_err(wrap(OP, "", container))
    }

    /// Returns the container's properties and a listing of its blobs.
    #[instrument(name = "blobi.get_container_properties_and_blobs", skip_all, fields(container = %container), err)]
    pub async fn get_container_properties_and_blobs(
        &self,
        container: &str,
    ) -> Result<ContainerPropertiesAndBlobs> {
        const OP: &str = "get_container_properties_and_blobs";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        let properties = handle.properties().await.map_err(wrap(OP, "", container))?;
        let blobs = handle.list_blobs().await.map_err(wrap(OP, "", container))?;
        Ok(ContainerPropertiesAndBlobs { properties, blobs })
    }

    #[instrument(name = "blobi.list_container_content", skip_all, fields(container = %container), err)]
    pub async fn list_container_content(&self, container: &str) -> Result<Vec<BlobItem>> {
        const OP: &str = "list_container_content";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        handle.list_blobs().await.map_err(wrap(OP, "", container))
    }

    /// Changes the public access level, creating the container with that
    /// level if it does not exist yet.
    #[instrument(name = "blobi.set_container_access_type", skip_all, fields(container = %container, access = %access), err)]
    pub async fn set_container_access_type(
        &self,
        container: &str,
        access: PublicAccessType,
    ) -> Result<()> {
        const OP: &str = "set_container_access_type";
        let handle = self.resolver.container(OP, container, access).await?;
        handle
            .set_access_policy(access)
            .await
            .map_err(wrap(OP, "", container))
    }

    #[instrument(name = "blobi.get_container_access_type", skip_all, fields(container = %container), err)]
    pub async fn get_container_access_type(&self, container: &str) -> Result<PublicAccessType> {
        const OP: &str = "get_container_access_type";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        handle.access_policy().await.map_err(wrap(OP, "", container))
    }

    /// Replaces the container's metadata.
    #[instrument(name = "blobi.set_container_metadata", skip_all, fields(container = %container), err)]
    pub async fn set_container_metadata(&self, container: &str, metadata: &Metadata) -> Result<()> {
        const OP: &str = "set_container_metadata";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        handle
            .set_metadata(metadata)
            .await
            .map_err(wrap(OP, "", container))
    }

    /// Adds `metadata` to the container's metadata, failing with
    /// [`StorageError::DuplicateMetadataKey`] if any key is already present.
    #[instrument(name = "blobi.append_container_metadata", skip_all, fields(container = %container), err)]
    pub async fn append_container_metadata(
        &self,
        container: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        const OP: &str = "append_container_metadata";
        let handle = self
            .resolver
            .container(OP, container, PublicAccessType::None)
            .await?;
        let existing = handle
            .properties()
            .await
            .map_err(wrap(OP, "", container))?
            .metadata;
        let merged = merge_metadata(existing, metadata, MergePolicy::Reject).map_err(|key| {
            StorageError::DuplicateMetadataKey {
                key,
                operation: OP,
                blob: String::new(),
                container: container.to_owned(),
            }
        })?;
        handle
            .set_metadata(&merged)
            .await
            .map_err(wrap(OP, "", container))
    }
}
