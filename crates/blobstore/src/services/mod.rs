//! The caller-facing operations. Each one resolves a handle through the
//! [`StorageClientResolver`](crate::StorageClientResolver), forwards to the
//! backend, and wraps backend failures in [`StorageError::Operation`].

mod blob;
mod container;
mod metadata;

pub use blob::{BlobService, SOURCE_FULL_PATH_KEY, SOURCE_FULL_URL_KEY};
pub use container::BlobContainerService;
pub use metadata::BlobMetadataService;

use crate::{error::StorageError, models::Metadata};

/// Returns a closure that wraps a backend error with the call's context.
fn wrap<'a>(
    operation: &'static str,
    blob: &'a str,
    container: &'a str,
) -> impl FnOnce(anyhow::Error) -> StorageError + 'a {
    move |source| StorageError::operation(operation, blob, container, source)
}

/// How incoming metadata is combined with what is already stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergePolicy {
    /// Fail if any incoming key is already present.
    Reject,
    /// Incoming values replace existing ones.
    Overwrite,
}

/// Merges `incoming` into `existing`. Keys compare case-insensitively, as
/// the storage service treats them. On conflict under [`MergePolicy::Reject`]
/// returns the offending key and leaves nothing changed.
fn merge_metadata(
    mut existing: Metadata,
    incoming: &Metadata,
    policy: MergePolicy,
) -> Result<Metadata, String> {
    let mut keys: Vec<&String> = incoming.keys().collect();
    keys.sort();
    for key in keys {
        let current = existing
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned();
        if let Some(current) = current {
            if policy == MergePolicy::Reject {
                return Err(key.clone());
            }
            existing.remove(&current);
        }
        existing.insert(key.clone(), incoming[key].clone());
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reject_policy_reports_first_conflicting_key() {
        let existing = md(&[("author", "ann"), ("kind", "pdf")]);
        let incoming = md(&[("zeta", "1"), ("Kind", "doc"), ("Author", "bob")]);
        assert_eq!(
            merge_metadata(existing, &incoming, MergePolicy::Reject),
            Err("Author".to_owned())
        );
    }

    #[test]
    fn reject_policy_adds_new_keys() {
        let existing = md(&[("author", "ann")]);
        let incoming = md(&[("kind", "pdf")]);
        assert_eq!(
            merge_metadata(existing, &incoming, MergePolicy::Reject).unwrap(),
            md(&[("author", "ann"), ("kind", "pdf")])
        );
    }

    #[test]
    fn overwrite_policy_replaces_case_insensitively() {
        let existing = md(&[("Author", "ann"), ("kind", "pdf")]);
        let incoming = md(&[("author", "bob"), ("pages", "3")]);
        assert_eq!(
            merge_metadata(existing, &incoming, MergePolicy::Overwrite).unwrap(),
            md(&[("author", "bob"), ("kind", "pdf"), ("pages", "3")])
        );
    }
}
