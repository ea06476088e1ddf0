use std::sync::Arc;

use blobi_config::{StorageAuth, StorageConfig};

use crate::{
    backend::{Blob, Container, ContainerTarget, StorageBackend},
    error::{NameKind, Result, StorageError},
    models::{Metadata, PublicAccessType},
};

/// Turns a [`StorageConfig`] and a container name into an authenticated
/// container handle, creating the container on the way.
///
/// Nothing is cached: every call resolves credentials, binds a fresh handle
/// and re-issues the create-if-not-exists check. Cloning is cheap and clones
/// share the configuration and backend.
#[derive(Clone)]
pub struct StorageClientResolver {
    config: Arc<StorageConfig>,
    backend: Arc<dyn StorageBackend>,
}

impl StorageClientResolver {
    pub fn new(config: StorageConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Resolves credentials and normalizes the container name, without
    /// touching the backend.
    pub fn target(&self, container: &str) -> Result<ContainerTarget> {
        if container.trim().is_empty() {
            return Err(StorageError::InvalidName(NameKind::Container));
        }
        let auth = self.config.resolve_auth()?;
        Ok(ContainerTarget {
            auth,
            container: container.to_lowercase(),
        })
    }

    /// Binds a handle to `container` without checking that it exists.
    pub fn container_ref(&self, container: &str) -> Result<Arc<dyn Container>> {
        let target = self.target(container)?;
        tracing::debug!(
            container = %target.container,
            account = target.auth.account_name().unwrap_or_default(),
            auth = auth_kind(&target.auth),
            "binding container handle"
        );
        self.backend
            .connect(&target)
            .map_err(StorageError::Configuration)
    }

    /// Returns a handle to `container`, creating the container with the
    /// given public access level if it does not exist. The access level of an
    /// existing container is left alone.
    ///
    /// `operation` names the caller's request in a
    /// [`StorageError::StorageUnavailable`] if the creation check fails.
    pub async fn container(
        &self,
        operation: &'static str,
        container: &str,
        access: PublicAccessType,
    ) -> Result<Arc<dyn Container>> {
        let (handle, _) = self
            .ensure_container(operation, container, access, &Metadata::new())
            .await?;
        Ok(handle)
    }

    /// Like [`container`](Self::container), also applying `metadata` if the
    /// container is created. Returns whether this call created it.
    pub async fn ensure_container(
        &self,
        operation: &'static str,
        container: &str,
        access: PublicAccessType,
        metadata: &Metadata,
    ) -> Result<(Arc<dyn Container>, bool)> {
        self.create_if_not_exists(operation, "", container, access, metadata)
            .await
    }

    /// Returns a handle to `blob` inside `container`, creating the container if needed.
    pub async fn blob(
        &self,
        operation: &'static str,
        container: &str,
        blob: &str,
        access: PublicAccessType,
    ) -> Result<Arc<dyn Blob>> {
        if blob.is_empty() {
            return Err(StorageError::InvalidName(NameKind::Blob));
        }
        let (handle, _) = self
            .create_if_not_exists(operation, blob, container, access, &Metadata::new())
            .await?;
        Ok(handle.blob(blob))
    }

    async fn create_if_not_exists(
        &self,
        operation: &'static str,
        blob: &str,
        container: &str,
        access: PublicAccessType,
        metadata: &Metadata,
    ) -> Result<(Arc<dyn Container>, bool)> {
        let handle = self.container_ref(container)?;
        let created = handle
            .create_if_not_exists(access, metadata)
            .await
            .map_err(|source| StorageError::StorageUnavailable {
                operation,
                blob: blob.to_owned(),
                container: container.to_owned(),
                source,
            })?;
        if created {
            tracing::info!(container = handle.name(), %access, "created container");
        }
        Ok((handle, created))
    }
}

fn auth_kind(auth: &StorageAuth) -> &'static str {
    match auth {
        StorageAuth::ManagedIdentity { .. } => "managed_identity",
        StorageAuth::ConnectionString(_) => "connection_string",
    }
}
