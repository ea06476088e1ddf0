use std::{
    collections::BTreeMap,
    sync::Arc,
};

use anyhow::Context as _;
use async_trait::async_trait;
use blobi_blobstore::{
    Blob, BlobItem, BlobProperties, Container, ContainerProperties, CopyOperation, Metadata,
    PublicAccessType, SnapshotInfo, UploadInfo,
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::Inner;

#[derive(Default)]
pub(crate) struct State {
    pub(crate) containers: BTreeMap<String, ContainerState>,
    pub(crate) create_checks: usize,
    etag_seq: u64,
}

pub(crate) struct ContainerState {
    access: PublicAccessType,
    metadata: Metadata,
    last_modified: DateTime<Utc>,
    etag: String,
    blobs: BTreeMap<String, StoredBlob>,
    /// Soft-deleted blobs, restorable with `undelete`.
    deleted: BTreeMap<String, StoredBlob>,
    snapshots: BTreeMap<String, Vec<(String, StoredBlob)>>,
}

#[derive(Clone)]
struct StoredBlob {
    content: Bytes,
    content_type: Option<String>,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    etag: String,
    /// Id of the copy that last wrote this blob.
    copy_id: Option<String>,
}

impl State {
    fn next_etag(&mut self) -> String {
        self.etag_seq += 1;
        format!("\"0x{:016X}\"", self.etag_seq)
    }

    fn container(&self, name: &str) -> anyhow::Result<&ContainerState> {
        self.containers
            .get(name)
            .with_context(|| format!("ContainerNotFound: container '{name}' does not exist"))
    }

    fn container_mut(&mut self, name: &str) -> anyhow::Result<&mut ContainerState> {
        self.containers
            .get_mut(name)
            .with_context(|| format!("ContainerNotFound: container '{name}' does not exist"))
    }

    fn blob(&self, container: &str, blob: &str) -> anyhow::Result<&StoredBlob> {
        self.container(container)?
            .blobs
            .get(blob)
            .with_context(|| blob_not_found(container, blob))
    }

    /// Finds the blob a copy source URL points at. The path is
    /// `/{container}/{blob}`, optionally preceded by an account segment as
    /// emulator URLs are.
    fn copy_source(&self, source: &url::Url) -> anyhow::Result<StoredBlob> {
        let segments: Vec<&str> = source
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        for skip in 0..segments.len().min(2) {
            let rest = &segments[skip..];
            if rest.len() < 2 {
                break;
            }
            let container = rest[0].to_lowercase();
            let blob = rest[1..].join("/");
            if let Some(found) = self
                .containers
                .get(&container)
                .and_then(|c| c.blobs.get(&blob))
            {
                return Ok(found.clone());
            }
        }
        anyhow::bail!("CannotVerifyCopySource: {source} does not name a blob in this store")
    }
}

fn blob_not_found(container: &str, blob: &str) -> String {
    format!("BlobNotFound: blob '{blob}' does not exist in container '{container}'")
}

pub(crate) struct MemoryContainer {
    inner: Arc<Inner>,
    name: String,
}

impl MemoryContainer {
    pub(crate) fn new(inner: Arc<Inner>, name: String) -> Self {
        Self { inner, name }
    }
}

#[async_trait]
impl Container for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_if_not_exists(
        &self,
        access: PublicAccessType,
        metadata: &Metadata,
    ) -> anyhow::Result<bool> {
        self.inner.with_state(|state| {
            state.create_checks += 1;
            if state.containers.contains_key(&self.name) {
                return Ok(false);
            }
            let etag = state.next_etag();
            state.containers.insert(
                self.name.clone(),
                ContainerState {
                    access,
                    metadata: metadata.clone(),
                    last_modified: Utc::now(),
                    etag,
                    blobs: BTreeMap::new(),
                    deleted: BTreeMap::new(),
                    snapshots: BTreeMap::new(),
                },
            );
            Ok(true)
        })
    }

    async fn delete_if_exists(&self) -> anyhow::Result<bool> {
        self.inner
            .with_state(|state| Ok(state.containers.remove(&self.name).is_some()))
    }

    async fn exists(&self) -> anyhow::Result<bool> {
        self.inner
            .with_state(|state| Ok(state.containers.contains_key(&self.name)))
    }

    async fn properties(&self) -> anyhow::Result<ContainerProperties> {
        self.inner.with_state(|state| {
            let container = state.container(&self.name)?;
            Ok(ContainerProperties {
                name: self.name.clone(),
                public_access: container.access,
                metadata: container.metadata.clone(),
                last_modified: Some(container.last_modified),
                etag: Some(container.etag.clone()),
            })
        })
    }

    async fn set_metadata(&self, metadata: &Metadata) -> anyhow::Result<()> {
        self.inner.with_state(|state| {
            let etag = state.next_etag();
            let container = state.container_mut(&self.name)?;
            container.metadata = metadata.clone();
            container.last_modified = Utc::now();
            container.etag = etag;
            Ok(())
        })
    }

    async fn access_policy(&self) -> anyhow::Result<PublicAccessType> {
        self.inner
            .with_state(|state| Ok(state.container(&self.name)?.access))
    }

    async fn set_access_policy(&self, access: PublicAccessType) -> anyhow::Result<()> {
        self.inner.with_state(|state| {
            let etag = state.next_etag();
            let container = state.container_mut(&self.name)?;
            container.access = access;
            container.last_modified = Utc::now();
            container.etag = etag;
            Ok(())
        })
    }

    async fn list_blobs(&self) -> anyhow::Result<Vec<BlobItem>> {
        self.inner.with_state(|state| {
            let container = state.container(&self.name)?;
            Ok(container
                .blobs
                .iter()
                .map(|(name, blob)| BlobItem {
                    name: name.clone(),
                    content_length: blob.content.len() as u64,
                    content_type: blob.content_type.clone(),
                    created_at: Some(blob.created_at),
                    last_modified: Some(blob.last_modified),
                    metadata: blob.metadata.clone(),
                })
                .collect())
        })
    }

    fn blob(&self, name: &str) -> Arc<dyn Blob> {
        Arc::new(MemoryBlob {
            inner: self.inner.clone(),
            container: self.name.clone(),
            name: name.to_owned(),
        })
    }
}

struct MemoryBlob {
    inner: Arc<Inner>,
    container: String,
    name: String,
}

#[async_trait]
impl Blob for MemoryBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn container_name(&self) -> &str {
        &self.container
    }

    async fn upload(&self, data: Bytes, metadata: &Metadata) -> anyhow::Result<UploadInfo> {
        self.inner.with_state(|state| {
            let etag = state.next_etag();
            let container = state.container_mut(&self.container)?;
            let now = Utc::now();
            let created_at = container
                .blobs
                .get(&self.name)
                .map_or(now, |existing| existing.created_at);
            container.deleted.remove(&self.name);
            container.blobs.insert(
                self.name.clone(),
                StoredBlob {
                    content: data,
                    content_type: Some("application/octet-stream".to_owned()),
                    metadata: metadata.clone(),
                    created_at,
                    last_modified: now,
                    etag: etag.clone(),
                    copy_id: None,
                },
            );
            Ok(UploadInfo {
                etag,
                last_modified: Some(now),
            })
        })
    }

    async fn download(&self) -> anyhow::Result<Bytes> {
        self.inner
            .with_state(|state| Ok(state.blob(&self.container, &self.name)?.content.clone()))
    }

    async fn exists(&self) -> anyhow::Result<bool> {
        self.inner.with_state(|state| {
            Ok(state
                .containers
                .get(&self.container)
                .is_some_and(|c| c.blobs.contains_key(&self.name)))
        })
    }

    async fn delete_if_exists(&self) -> anyhow::Result<bool> {
        self.inner.with_state(|state| {
            let container = state.container_mut(&self.container)?;
            let Some(blob) = container.blobs.remove(&self.name) else {
                return Ok(false);
            };
            container.snapshots.remove(&self.name);
            container.deleted.insert(self.name.clone(), blob);
            Ok(true)
        })
    }

    async fn properties(&self) -> anyhow::Result<BlobProperties> {
        self.inner.with_state(|state| {
            let blob = state.blob(&self.container, &self.name)?;
            Ok(BlobProperties {
                name: self.name.clone(),
                container: self.container.clone(),
                content_length: blob.content.len() as u64,
                content_type: blob.content_type.clone(),
                created_at: Some(blob.created_at),
                last_modified: Some(blob.last_modified),
                etag: Some(blob.etag.clone()),
                metadata: blob.metadata.clone(),
            })
        })
    }

    async fn metadata(&self) -> anyhow::Result<Metadata> {
        self.inner
            .with_state(|state| Ok(state.blob(&self.container, &self.name)?.metadata.clone()))
    }

    async fn set_metadata(&self, metadata: &Metadata) -> anyhow::Result<()> {
        self.inner.with_state(|state| {
            let etag = state.next_etag();
            let blob = state
                .container_mut(&self.container)?
                .blobs
                .get_mut(&self.name)
                .with_context(|| blob_not_found(&self.container, &self.name))?;
            blob.metadata = metadata.clone();
            blob.last_modified = Utc::now();
            blob.etag = etag;
            Ok(())
        })
    }

    async fn start_copy_from_url(
        &self,
        source: &url::Url,
        metadata: &Metadata,
    ) -> anyhow::Result<CopyOperation> {
        self.inner.with_state(|state| {
            let mut copied = state.copy_source(source)?;
            let etag = state.next_etag();
            let now = Utc::now();
            if !metadata.is_empty() {
                copied.metadata = metadata.clone();
            }
            copied.created_at = now;
            copied.last_modified = now;
            copied.etag = etag;
            let copy_id = uuid::Uuid::new_v4().to_string();
            copied.copy_id = Some(copy_id.clone());
            let container = state.container_mut(&self.container)?;
            container.deleted.remove(&self.name);
            container.blobs.insert(self.name.clone(), copied);

            tracing::debug!(%copy_id, %source, blob = %self.name, "copy completed");
            Ok(CopyOperation {
                copy_id,
                source: source.clone(),
            })
        })
    }

    async fn abort_copy(&self, copy_id: &str) -> anyhow::Result<()> {
        self.inner.with_state(|state| {
            // Copies complete immediately, so there is never one to abort.
            let blob = state.blob(&self.container, &self.name)?;
            if blob.copy_id.as_deref() == Some(copy_id) {
                anyhow::bail!("NoPendingCopyOperation: copy '{copy_id}' has already completed");
            }
            anyhow::bail!("InvalidQueryParameterValue: unknown copy id '{copy_id}'")
        })
    }

    async fn snapshot(&self) -> anyhow::Result<SnapshotInfo> {
        self.inner.with_state(|state| {
            let blob = state.blob(&self.container, &self.name)?.clone();
            let snapshot = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
            state
                .container_mut(&self.container)?
                .snapshots
                .entry(self.name.clone())
                .or_default()
                .push((snapshot.clone(), blob));
            Ok(SnapshotInfo { snapshot })
        })
    }

    async fn undelete(&self) -> anyhow::Result<()> {
        self.inner.with_state(|state| {
            let container = state.container_mut(&self.container)?;
            if container.blobs.contains_key(&self.name) {
                return Ok(());
            }
            let blob = container
                .deleted
                .remove(&self.name)
                .with_context(|| blob_not_found(&self.container, &self.name))?;
            container.blobs.insert(self.name.clone(), blob);
            Ok(())
        })
    }
}
