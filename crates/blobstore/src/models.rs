use std::{collections::HashMap, fmt, str::FromStr};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-defined name/value pairs attached to a container or blob.
pub type Metadata = HashMap<String, String>;

/// Whether anonymous clients may read a container's content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicAccessType {
    /// Only authorized requests can read.
    #[default]
    None,
    /// Anonymous clients can read blobs but cannot enumerate the container.
    Blob,
    /// Anonymous clients can read blobs and enumerate the container.
    Container,
}

impl fmt::Display for PublicAccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublicAccessType::None => "none",
            PublicAccessType::Blob => "blob",
            PublicAccessType::Container => "container",
        })
    }
}

impl FromStr for PublicAccessType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "private" => Ok(PublicAccessType::None),
            "blob" => Ok(PublicAccessType::Blob),
            "container" => Ok(PublicAccessType::Container),
            other => anyhow::bail!("unknown public access type {other:?}"),
        }
    }
}

/// Properties of a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerProperties {
    pub name: String,
    pub public_access: PublicAccessType,
    pub metadata: Metadata,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A container's properties together with the blobs it holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerPropertiesAndBlobs {
    pub properties: ContainerProperties,
    pub blobs: Vec<BlobItem>,
}

/// One entry of a container listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlobItem {
    pub name: String,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

/// Properties of a single blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlobProperties {
    pub name: String,
    pub container: String,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub metadata: Metadata,
}

/// Outcome of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadInfo {
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A server-side copy that has been started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CopyOperation {
    /// Identifier that can be used to abort the copy while it is pending.
    pub copy_id: String,
    pub source: url::Url,
}

/// A read-only point-in-time snapshot of a blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    /// The snapshot identifier, an RFC 3339 timestamp assigned by the service.
    pub snapshot: String,
}

/// The content of a downloaded blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    container: String,
    blob: String,
    content: Bytes,
}

impl Download {
    pub(crate) fn new(container: &str, blob: &str, content: Bytes) -> Self {
        Self {
            container: container.to_owned(),
            blob: blob.to_owned(),
            content,
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container
    }

    pub fn blob_name(&self) -> &str {
        &self.blob
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.content
    }

    pub fn into_bytes(self) -> Bytes {
        self.content
    }

    /// Decodes the content as UTF-8.
    pub fn into_string(self) -> anyhow::Result<String> {
        String::from_utf8(self.content.to_vec()).map_err(|e| {
            anyhow::anyhow!(
                "blob '{}' in container '{}' is not valid UTF-8: {e}",
                self.blob,
                self.container
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_access_type_parses_and_prints() {
        for access in [
            PublicAccessType::None,
            PublicAccessType::Blob,
            PublicAccessType::Container,
        ] {
            assert_eq!(access.to_string().parse::<PublicAccessType>().unwrap(), access);
        }
        assert_eq!(
            "Private".parse::<PublicAccessType>().unwrap(),
            PublicAccessType::None
        );
        assert!("everyone".parse::<PublicAccessType>().is_err());
        assert_eq!(PublicAccessType::default(), PublicAccessType::None);
    }

    #[test]
    fn download_into_string() {
        let download = Download::new("docs", "a.txt", Bytes::from_static(b"hello"));
        assert_eq!(download.len(), 5);
        assert_eq!(download.into_string().unwrap(), "hello");

        let download = Download::new("docs", "a.bin", Bytes::from_static(&[0xff, 0xfe]));
        let err = download.into_string().unwrap_err();
        assert!(err.to_string().contains("a.bin"));
    }
}
