use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use azure_core::{error::ErrorKind, request_options::Metadata as AzureMetadata, StatusCode};
use azure_storage_blobs::{
    blob::{BlobBlockType, BlockList},
    prelude::{BlobClient, BlockId, ContainerClient, DeleteSnapshotsMethod, PublicAccess},
};
use blobi_blobstore::{
    Blob, BlobItem, BlobProperties, Container, ContainerProperties, ContainerTarget,
    CopyOperation, Metadata, PublicAccessType, SnapshotInfo, StorageBackend, UploadInfo,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub mod auth;
mod rest;

use auth::Connection;
use rest::RestClient;

/// Azure limits us to 50k blocks per blob. At 4MB/block that allows 200GB.
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Binds Azure container clients. Holds no state: every
/// [`connect`](StorageBackend::connect) builds a client from the target's
/// credentials.
#[derive(Default)]
pub struct AzureBackend {
    _priv: (),
}

impl AzureBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for AzureBackend {
    fn connect(&self, target: &ContainerTarget) -> Result<Arc<dyn Container>> {
        let connection = Connection::new(&target.auth)?;
        let client = connection
            .client_builder()
            .container_client(target.container.clone());
        Ok(Arc::new(AzureContainer {
            name: target.container.clone(),
            client,
            rest: RestClient::new(connection.credentials),
        }))
    }
}

struct AzureContainer {
    name: String,
    client: ContainerClient,
    rest: RestClient,
}

#[async_trait]
impl Container for AzureContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_if_not_exists(
        &self,
        access: PublicAccessType,
        metadata: &Metadata,
    ) -> Result<bool> {
        let mut create = self.client.create().public_access(to_azure_access(access));
        if !metadata.is_empty() {
            create = create.metadata(to_azure_metadata(metadata));
        }
        match create.await {
            Ok(_) => Ok(true),
            Err(e) if has_error_code(&e, "ContainerAlreadyExists") => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_if_exists(&self) -> Result<bool> {
        match self.client.delete().await {
            Ok(_) => Ok(true),
            Err(e) if has_status(&e, StatusCode::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.client.exists().await?)
    }

    async fn properties(&self) -> Result<ContainerProperties> {
        let container = self.client.get_properties().await?.container;
        Ok(ContainerProperties {
            name: container.name,
            public_access: from_azure_access(container.public_access),
            metadata: container.metadata,
            last_modified: to_utc(
                container.last_modified.unix_timestamp(),
                container.last_modified.nanosecond(),
            ),
            etag: Some(container.e_tag.to_string()),
        })
    }

    async fn set_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.rest
            .set_container_metadata(self.client.url()?, metadata)
            .await?;
        Ok(())
    }

    async fn access_policy(&self) -> Result<PublicAccessType> {
        let acl = self.client.get_acl().await?;
        Ok(from_azure_access(acl.public_access))
    }

    async fn set_access_policy(&self, access: PublicAccessType) -> Result<()> {
        self.client.set_acl(to_azure_access(access)).await?;
        Ok(())
    }

    async fn list_blobs(&self) -> Result<Vec<BlobItem>> {
        let mut pages = self.client.list_blobs().include_metadata(true).into_stream();
        let mut items = vec![];
        while let Some(page) = pages.try_next().await? {
            for blob in page.blobs.blobs() {
                let props = &blob.properties;
                items.push(BlobItem {
                    name: blob.name.clone(),
                    content_length: props.content_length,
                    content_type: non_empty(&props.content_type),
                    created_at: to_utc(
                        props.creation_time.unix_timestamp(),
                        props.creation_time.nanosecond(),
                    ),
                    last_modified: to_utc(
                        props.last_modified.unix_timestamp(),
                        props.last_modified.nanosecond(),
                    ),
                    metadata: blob.metadata.clone().unwrap_or_default(),
                });
            }
        }
        Ok(items)
    }

    fn blob(&self, name: &str) -> Arc<dyn Blob> {
        Arc::new(AzureBlob {
            name: name.to_owned(),
            container: self.name.clone(),
            client: self.client.blob_client(name),
            rest: self.rest.clone(),
        })
    }
}

struct AzureBlob {
    name: String,
    container: String,
    client: BlobClient,
    rest: RestClient,
}

#[async_trait]
impl Blob for AzureBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn container_name(&self) -> &str {
        &self.container
    }

    async fn upload(&self, data: Bytes, metadata: &Metadata) -> Result<UploadInfo> {
        if data.len() > BLOCK_SIZE {
            return self.upload_blocks(data, metadata).await;
        }
        let mut put = self.client.put_block_blob(data);
        if !metadata.is_empty() {
            put = put.metadata(to_azure_metadata(metadata));
        }
        let response = put.await?;
        Ok(UploadInfo {
            etag: response.etag.to_string(),
            last_modified: to_utc(
                response.last_modified.unix_timestamp(),
                response.last_modified.nanosecond(),
            ),
        })
    }

    async fn download(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.client.get_content().await?))
    }

    async fn download_to(&self, writer: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let mut chunks = self.client.get().into_stream();
        let mut written = 0;
        while let Some(chunk) = chunks.next().await {
            let data = chunk?.data.collect().await?;
            writer.write_all(&data).await?;
            written += data.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.client.exists().await?)
    }

    async fn delete_if_exists(&self) -> Result<bool> {
        let delete = self
            .client
            .delete()
            .delete_snapshots_method(DeleteSnapshotsMethod::Include);
        match delete.await {
            Ok(_) => Ok(true),
            Err(e) if has_status(&e, StatusCode::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn properties(&self) -> Result<BlobProperties> {
        let blob = self.client.get_properties().await?.blob;
        let props = blob.properties;
        Ok(BlobProperties {
            name: self.name.clone(),
            container: self.container.clone(),
            content_length: props.content_length,
            content_type: non_empty(&props.content_type),
            created_at: to_utc(
                props.creation_time.unix_timestamp(),
                props.creation_time.nanosecond(),
            ),
            last_modified: to_utc(
                props.last_modified.unix_timestamp(),
                props.last_modified.nanosecond(),
            ),
            etag: Some(props.etag.to_string()),
            metadata: blob.metadata.unwrap_or_default(),
        })
    }

    async fn metadata(&self) -> Result<Metadata> {
        let response = self.client.get_metadata().await?;
        Ok(from_azure_metadata(response.metadata))
    }

    async fn set_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.client
            .set_metadata()
            .metadata(to_azure_metadata(metadata))
            .await?;
        Ok(())
    }

    async fn start_copy_from_url(
        &self,
        source: &url::Url,
        metadata: &Metadata,
    ) -> Result<CopyOperation> {
        let response = self
            .client
            .copy(source.clone())
            .metadata(to_azure_metadata(metadata))
            .await?;
        Ok(CopyOperation {
            copy_id: response.copy_id.to_string(),
            source: source.clone(),
        })
    }

    async fn abort_copy(&self, copy_id: &str) -> Result<()> {
        self.rest.abort_copy(self.client.url()?, copy_id).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<SnapshotInfo> {
        let response = self.client.snapshot().await?;
        // The SDK only exposes the snapshot id as a query parameter.
        let mut url = self.client.url()?;
        url.set_query(None);
        azure_core::AppendToUrlQuery::append_to_url_query(&response.snapshot, &mut url);
        let snapshot = url
            .query_pairs()
            .find(|(key, _)| key == "snapshot")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| anyhow::anyhow!("snapshot response carried no snapshot id"))?;
        Ok(SnapshotInfo { snapshot })
    }

    async fn undelete(&self) -> Result<()> {
        self.rest.undelete(self.client.url()?).await?;
        Ok(())
    }
}

impl AzureBlob {
    /// Uploads `data` as a list of blocks, for payloads too large for a single put.
    async fn upload_blocks(&self, data: Bytes, metadata: &Metadata) -> Result<UploadInfo> {
        let mut blocks = vec![];
        let mut offset = 0;
        while offset < data.len() {
            let end = usize::min(offset + BLOCK_SIZE, data.len());
            let id_bytes = uuid::Uuid::new_v4().as_bytes().to_vec();
            let block_id = BlockId::new(id_bytes);
            self.client
                .put_block(block_id.clone(), data.slice(offset..end))
                .await?;
            blocks.push(BlobBlockType::Uncommitted(block_id));
            offset = end;
        }
        tracing::debug!(blocks = blocks.len(), blob = %self.name, "committing block list");

        let mut commit = self.client.put_block_list(BlockList { blocks });
        if !metadata.is_empty() {
            commit = commit.metadata(to_azure_metadata(metadata));
        }
        let response = commit.await?;
        Ok(UploadInfo {
            etag: response.etag.to_string(),
            last_modified: to_utc(
                response.last_modified.unix_timestamp(),
                response.last_modified.nanosecond(),
            ),
        })
    }
}

fn has_status(err: &azure_core::Error, expected: StatusCode) -> bool {
    matches!(err.kind(), ErrorKind::HttpResponse { status, .. } if *status == expected)
}

/// A 409 on container creation can also mean the container is being deleted,
/// so only the service error code tells "already exists" apart.
fn has_error_code(err: &azure_core::Error, expected: &str) -> bool {
    matches!(
        err.kind(),
        ErrorKind::HttpResponse { error_code: Some(code), .. } if code == expected
    )
}

fn to_azure_access(access: PublicAccessType) -> PublicAccess {
    match access {
        PublicAccessType::None => PublicAccess::None,
        PublicAccessType::Blob => PublicAccess::Blob,
        PublicAccessType::Container => PublicAccess::Container,
    }
}

fn from_azure_access(access: PublicAccess) -> PublicAccessType {
    match access {
        PublicAccess::None => PublicAccessType::None,
        PublicAccess::Blob => PublicAccessType::Blob,
        PublicAccess::Container => PublicAccessType::Container,
    }
}

fn to_azure_metadata(metadata: &Metadata) -> AzureMetadata {
    let mut out = AzureMetadata::new();
    for (key, value) in metadata {
        out.insert(key.clone(), value.clone());
    }
    out
}

fn from_azure_metadata(mut metadata: AzureMetadata) -> Metadata {
    std::mem::take(metadata.as_mut())
        .into_iter()
        .map(|(key, value)| (key, String::from_utf8_lossy(&value).into_owned()))
        .collect()
}

fn to_utc(seconds: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, nanos)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
