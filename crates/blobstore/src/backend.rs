use std::sync::Arc;

use async_trait::async_trait;
use blobi_config::StorageAuth;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::models::{
    BlobItem, BlobProperties, ContainerProperties, CopyOperation, Metadata, PublicAccessType,
    SnapshotInfo, UploadInfo,
};

/// Everything a backend needs to bind a container handle: resolved
/// credentials and the (already lowercased) container name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerTarget {
    pub auth: StorageAuth,
    pub container: String,
}

/// A blob storage provider. Implementations bind handles to remote
/// containers; they hold no per-container state between calls.
pub trait StorageBackend: Send + Sync {
    /// Builds a handle to the target container. This must not perform any
    /// network traffic; existence is checked by the caller.
    fn connect(&self, target: &ContainerTarget) -> anyhow::Result<Arc<dyn Container>>;
}

/// A named container in the remote store, bound to one set of credentials.
#[async_trait]
pub trait Container: Send + Sync {
    fn name(&self) -> &str;

    /// Creates the container if it does not exist yet. `access` and
    /// `metadata` apply only when the container is created by this call.
    /// Returns whether the container was created.
    async fn create_if_not_exists(
        &self,
        access: PublicAccessType,
        metadata: &Metadata,
    ) -> anyhow::Result<bool>;
    /// Returns whether the container existed and was deleted.
    async fn delete_if_exists(&self) -> anyhow::Result<bool>;
    async fn exists(&self) -> anyhow::Result<bool>;
    async fn properties(&self) -> anyhow::Result<ContainerProperties>;
    /// Replaces the container metadata.
    async fn set_metadata(&self, metadata: &Metadata) -> anyhow::Result<()>;
    async fn access_policy(&self) -> anyhow::Result<PublicAccessType>;
    async fn set_access_policy(&self, access: PublicAccessType) -> anyhow::Result<()>;
    async fn list_blobs(&self) -> anyhow::Result<Vec<BlobItem>>;
    fn blob(&self, name: &str) -> Arc<dyn Blob>;
}

/// A named object inside a [`Container`].
#[async_trait]
pub trait Blob: Send + Sync {
    fn name(&self) -> &str;
    fn container_name(&self) -> &str;

    /// Writes the blob, replacing any existing content and metadata.
    async fn upload(&self, data: Bytes, metadata: &Metadata) -> anyhow::Result<UploadInfo>;
    async fn download(&self) -> anyhow::Result<Bytes>;
    /// Streams the blob into `writer`, returning the number of bytes written.
    async fn download_to(
        &self,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> anyhow::Result<u64> {
        let content = self.download().await?;
        writer.write_all(&content).await?;
        writer.flush().await?;
        Ok(content.len() as u64)
    }
    async fn exists(&self) -> anyhow::Result<bool>;
    /// Returns whether the blob existed and was deleted.
    async fn delete_if_exists(&self) -> anyhow::Result<bool>;
    async fn properties(&self) -> anyhow::Result<BlobProperties>;
    async fn metadata(&self) -> anyhow::Result<Metadata>;
    /// Replaces the blob metadata.
    async fn set_metadata(&self, metadata: &Metadata) -> anyhow::Result<()>;
    async fn start_copy_from_url(
        &self,
        source: &url::Url,
        metadata: &Metadata,
    ) -> anyhow::Result<CopyOperation>;
    async fn abort_copy(&self, copy_id: &str) -> anyhow::Result<()>;
    async fn snapshot(&self) -> anyhow::Result<SnapshotInfo>;
    /// Restores a soft-deleted blob.
    async fn undelete(&self) -> anyhow::Result<()>;
}
