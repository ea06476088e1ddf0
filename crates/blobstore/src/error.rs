use std::fmt;

use blobi_config::ConfigError;

/// Type alias for [`Result`]s with [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;

/// What kind of name failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Container,
    Blob,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameKind::Container => "container",
            NameKind::Blob => "blob",
        })
    }
}

/// Errors returned by the resolver and the storage services.
///
/// Every variant raised on behalf of a caller's request carries the
/// container (and, where relevant, blob and operation) the caller passed in,
/// so it can be logged without re-deriving context from the transport error.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Credentials are missing or contradictory, or a client could not be
    /// built from them.
    #[error("storage configuration error: {0:#}")]
    Configuration(#[source] anyhow::Error),
    /// A container or blob name was empty.
    #[error("{0} name must not be empty")]
    InvalidName(NameKind),
    /// The create-if-not-exists check made on behalf of `operation` failed.
    #[error("{operation} failed for {}: storage unavailable, could not ensure the container exists", describe_target(.blob, .container))]
    StorageUnavailable {
        operation: &'static str,
        /// Empty for container-level operations.
        blob: String,
        container: String,
        #[source]
        source: anyhow::Error,
    },
    /// A remote call made on behalf of `operation` failed.
    #[error("{operation} failed for {}", describe_target(.blob, .container))]
    Operation {
        operation: &'static str,
        /// Empty for container-level operations.
        blob: String,
        container: String,
        #[source]
        source: anyhow::Error,
    },
    /// Appending metadata would overwrite an existing key.
    #[error("{operation} failed for {}: metadata key '{key}' already exists", describe_target(.blob, .container))]
    DuplicateMetadataKey {
        key: String,
        operation: &'static str,
        /// Empty for container-level operations.
        blob: String,
        container: String,
    },
}

fn describe_target(blob: &str, container: &str) -> String {
    if blob.is_empty() {
        format!("container '{container}'")
    } else {
        format!("blob '{blob}' in container '{container}'")
    }
}

impl StorageError {
    pub(crate) fn operation(
        operation: &'static str,
        blob: &str,
        container: &str,
        source: anyhow::Error,
    ) -> Self {
        StorageError::Operation {
            operation,
            blob: blob.to_owned(),
            container: container.to_owned(),
            source,
        }
    }

    /// The name of the operation that failed, if this error came from one.
    pub fn operation_name(&self) -> Option<&str> {
        match self {
            StorageError::Operation { operation, .. }
            | StorageError::DuplicateMetadataKey { operation, .. }
            | StorageError::StorageUnavailable { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// The blob the failing call was about; empty for container-level operations.
    pub fn blob_name(&self) -> Option<&str> {
        match self {
            StorageError::Operation { blob, .. }
            | StorageError::DuplicateMetadataKey { blob, .. }
            | StorageError::StorageUnavailable { blob, .. } => Some(blob.as_str()),
            _ => None,
        }
    }

    /// The container the failing call was about, as the caller spelled it.
    pub fn container_name(&self) -> Option<&str> {
        match self {
            StorageError::Operation { container, .. }
            | StorageError::DuplicateMetadataKey { container, .. }
            | StorageError::StorageUnavailable { container, .. } => Some(container.as_str()),
            _ => None,
        }
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::Configuration(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_exposes_context() {
        let err = StorageError::operation(
            "download_blob",
            "Report.PDF",
            "Docs",
            anyhow::anyhow!("connection reset"),
        );
        assert_eq!(err.operation_name(), Some("download_blob"));
        assert_eq!(err.blob_name(), Some("Report.PDF"));
        assert_eq!(err.container_name(), Some("Docs"));
        assert_eq!(
            err.to_string(),
            "download_blob failed for blob 'Report.PDF' in container 'Docs'"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection reset");
    }

    #[test]
    fn container_level_errors_have_empty_blob_name() {
        let err = StorageError::operation("delete_container", "", "docs", anyhow::anyhow!("boom"));
        assert_eq!(err.blob_name(), Some(""));
        assert_eq!(err.to_string(), "delete_container failed for container 'docs'");
    }

    #[test]
    fn unavailable_error_names_the_call() {
        let err = StorageError::StorageUnavailable {
            operation: "upload_blob",
            blob: "a.txt".to_owned(),
            container: "Docs".to_owned(),
            source: anyhow::anyhow!("403 AuthenticationFailed"),
        };
        assert_eq!(err.operation_name(), Some("upload_blob"));
        assert_eq!(err.blob_name(), Some("a.txt"));
        assert_eq!(err.container_name(), Some("Docs"));
        assert_eq!(
            err.to_string(),
            "upload_blob failed for blob 'a.txt' in container 'Docs': storage unavailable, could not ensure the container exists"
        );
    }

    #[test]
    fn configuration_error_keeps_cause() {
        let err = StorageError::from(ConfigError::MissingCredentials);
        assert!(matches!(err, StorageError::Configuration(_)));
        assert!(err.to_string().contains("no storage credentials configured"));
        assert_eq!(err.operation_name(), None);
        assert_eq!(err.container_name(), None);
    }
}
