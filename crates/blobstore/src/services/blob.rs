use bytes::Bytes;
use tokio::io::AsyncWrite;
use tracing::instrument;

use super::{wrap, BlobMetadataService};
use crate::{
    error::Result,
    models::{
        BlobProperties, CopyOperation, Download, Metadata, PublicAccessType, SnapshotInfo,
        UploadInfo,
    },
    StorageClientResolver,
};

/// Metadata key stamped on copy destinations: the full source URL.
pub const SOURCE_FULL_URL_KEY: &str = "sourceFullUrl";
/// Metadata key stamped on copy destinations: the path of the source URL.
pub const SOURCE_FULL_PATH_KEY: &str = "sourceFullPath";

/// Blob-level operations.
#[derive(Clone)]
pub struct BlobService {
    resolver: StorageClientResolver,
    metadata: BlobMetadataService,
}

impl BlobService {
    pub fn new(resolver: StorageClientResolver) -> Self {
        let metadata = BlobMetadataService::new(resolver.clone());
        Self { resolver, metadata }
    }

    /// Uploads `data`, creating the container with `access` if it does not exist.
    #[instrument(name = "blobi.upload_blob", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: impl Into<Bytes>,
        access: PublicAccessType,
    ) -> Result<UploadInfo> {
        self.upload(container, blob, data.into(), &Metadata::new(), access)
            .await
    }

    /// Uploads `data` with `metadata`, creating the container with `access`
    /// if it does not exist.
    #[instrument(name = "blobi.upload_blob_with_metadata", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn upload_blob_with_metadata(
        &self,
        container: &str,
        blob: &str,
        data: impl Into<Bytes>,
        metadata: &Metadata,
        access: PublicAccessType,
    ) -> Result<UploadInfo> {
        self.upload(container, blob, data.into(), metadata, access)
            .await
    }

    async fn upload(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        metadata: &Metadata,
        access: PublicAccessType,
    ) -> Result<UploadInfo> {
        const OP: &str = "upload_blob";
        let handle = self.resolver.blob(OP, container, blob, access).await?;
        let size = data.len();
        let info = handle
            .upload(data, metadata)
            .await
            .map_err(wrap(OP, blob, container))?;
        tracing::debug!(size, etag = %info.etag, "uploaded blob");
        Ok(info)
    }

    #[instrument(name = "blobi.download_blob", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn download_blob(&self, container: &str, blob: &str) -> Result<Download> {
        const OP: &str = "download_blob";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        let content = handle.download().await.map_err(wrap(OP, blob, container))?;
        Ok(Download::new(container, blob, content))
    }

    /// Writes the blob's content into `writer`, returning the number of bytes written.
    #[instrument(name = "blobi.download_blob_to", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn download_blob_to<W>(
        &self,
        container: &str,
        blob: &str,
        writer: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        const OP: &str = "download_blob_to";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle
            .download_to(writer)
            .await
            .map_err(wrap(OP, blob, container))
    }

    #[instrument(name = "blobi.blob_exists", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
        const OP: &str = "blob_exists";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle.exists().await.map_err(wrap(OP, blob, container))
    }

    /// Deletes the blob and its snapshots. Returns `false` if there was nothing to delete.
    #[instrument(name = "blobi.delete_blob_if_exists", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool> {
        const OP: &str = "delete_blob_if_exists";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle
            .delete_if_exists()
            .await
            .map_err(wrap(OP, blob, container))
    }

    #[instrument(name = "blobi.get_blob_properties", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn get_blob_properties(
        &self,
        container: &str,
        blob: &str,
    ) -> Result<BlobProperties> {
        const OP: &str = "get_blob_properties";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle.properties().await.map_err(wrap(OP, blob, container))
    }

    /// Starts a server-side copy of `source` into the blob, creating the
    /// container with `access` if needed. The destination is tagged with the
    /// source URL and path.
    #[instrument(name = "blobi.copy_blob_from_uri", skip_all, fields(container = %container, blob = %blob, source = %source), err)]
    pub async fn copy_blob_from_uri(
        &self,
        container: &str,
        blob: &str,
        source: &url::Url,
        access: PublicAccessType,
    ) -> Result<CopyOperation> {
        const OP: &str = "copy_blob_from_uri";
        let handle = self.resolver.blob(OP, container, blob, access).await?;
        let metadata = Metadata::from([
            (SOURCE_FULL_URL_KEY.to_owned(), source.as_str().to_owned()),
            (SOURCE_FULL_PATH_KEY.to_owned(), source.path().to_owned()),
        ]);
        handle
            .start_copy_from_url(source, &metadata)
            .await
            .map_err(wrap(OP, blob, container))
    }

    /// Aborts a pending copy started by [`copy_blob_from_uri`](Self::copy_blob_from_uri).
    #[instrument(name = "blobi.abort_copy_blob_from_uri", skip_all, fields(container = %container, blob = %blob, copy_id = %copy_id), err)]
    pub async fn abort_copy_blob_from_uri(
        &self,
        container: &str,
        blob: &str,
        copy_id: &str,
    ) -> Result<()> {
        const OP: &str = "abort_copy_blob_from_uri";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle
            .abort_copy(copy_id)
            .await
            .map_err(wrap(OP, blob, container))
    }

    #[instrument(name = "blobi.create_blob_snapshot", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn create_blob_snapshot(
        &self,
        container: &str,
        blob: &str,
    ) -> Result<SnapshotInfo> {
        const OP: &str = "create_blob_snapshot";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle.snapshot().await.map_err(wrap(OP, blob, container))
    }

    /// Restores a soft-deleted blob.
    #[instrument(name = "blobi.undelete_blob", skip_all, fields(container = %container, blob = %blob), err)]
    pub async fn undelete_blob(&self, container: &str, blob: &str) -> Result<()> {
        const OP: &str = "undelete_blob";
        let handle = self
            .resolver
            .blob(OP, container, blob, PublicAccessType::None)
            .await?;
        handle.undelete().await.map_err(wrap(OP, blob, container))
    }

    /// See [`BlobMetadataService::append_metadata`].
    pub async fn append_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        self.metadata
            .append_metadata(container, blob, metadata)
            .await
    }

    /// See [`BlobMetadataService::set_blob_metadata`].
    pub async fn set_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        self.metadata
            .set_blob_metadata(container, blob, metadata)
            .await
    }
}
