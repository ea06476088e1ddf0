//! Blob service calls that `azure_storage_blobs` has no builder for. They go
//! through a pipeline carrying the same credentials as the SDK clients, so
//! shared key, SAS and token auth all sign them the same way.

use azure_core::{headers::Headers, ClientOptions, Context, Method, Pipeline, Request, Url};
use azure_storage::{
    clients::{finalize_request, new_pipeline_from_options, ServiceType},
    StorageCredentials,
};
use blobi_blobstore::Metadata;

const META_PREFIX: &str = "x-ms-meta-";

#[derive(Clone)]
pub struct RestClient {
    pipeline: Pipeline,
}

impl RestClient {
    pub fn new(credentials: StorageCredentials) -> Self {
        Self {
            pipeline: new_pipeline_from_options(ClientOptions::default(), credentials),
        }
    }

    /// Replaces all metadata of the container at `container_url`.
    pub async fn set_container_metadata(
        &self,
        container_url: Url,
        metadata: &Metadata,
    ) -> azure_core::Result<()> {
        self.send(set_container_metadata_request(container_url, metadata)?)
            .await
    }

    /// Aborts the pending copy `copy_id` into the blob at `blob_url`.
    pub async fn abort_copy(&self, blob_url: Url, copy_id: &str) -> azure_core::Result<()> {
        self.send(abort_copy_request(blob_url, copy_id)?).await
    }

    /// Restores the soft-deleted blob at `blob_url` and its snapshots.
    pub async fn undelete(&self, blob_url: Url) -> azure_core::Result<()> {
        self.send(undelete_request(blob_url)?).await
    }

    async fn send(&self, mut request: Request) -> azure_core::Result<()> {
        let mut context = Context::new();
        self.pipeline
            .send(context.insert(ServiceType::Blob), &mut request)
            .await?;
        Ok(())
    }
}

fn set_container_metadata_request(
    mut url: Url,
    metadata: &Metadata,
) -> azure_core::Result<Request> {
    url.query_pairs_mut()
        .append_pair("restype", "container")
        .append_pair("comp", "metadata");
    let mut headers = Headers::new();
    for (key, value) in metadata {
        headers.insert(format!("{META_PREFIX}{key}"), value.clone());
    }
    finalize_request(url, Method::Put, headers, None)
}

fn abort_copy_request(mut url: Url, copy_id: &str) -> azure_core::Result<Request> {
    url.query_pairs_mut()
        .append_pair("comp", "copy")
        .append_pair("copyid", copy_id);
    let mut headers = Headers::new();
    headers.insert("x-ms-copy-action", "abort");
    finalize_request(url, Method::Put, headers, None)
}

fn undelete_request(mut url: Url) -> azure_core::Result<Request> {
    url.query_pairs_mut().append_pair("comp", "undelete");
    finalize_request(url, Method::Put, Headers::new(), None)
}
