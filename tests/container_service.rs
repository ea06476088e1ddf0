mod common;

use blobi::{PublicAccessType, StorageError};
use common::{md, memory_blobi};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn create_with_metadata_then_read_properties() {
    let (blobi, _) = memory_blobi();
    let containers = blobi.containers();

    let created = containers
        .create_container_with_metadata("Docs", &md(&[("team", "search")]), PublicAccessType::Container)
        .await
        .unwrap();
    assert!(created);

    let props = containers.get_container_properties("docs").await.unwrap();
    assert_eq!(props.name, "docs");
    assert_eq!(props.public_access, PublicAccessType::Container);
    assert_eq!(props.metadata, md(&[("team", "search")]));
    assert!(props.etag.is_some());
}

#[tokio::test]
async fn properties_and_listing() {
    let (blobi, _) = memory_blobi();
    for name in ["b.txt", "a.txt"] {
        blobi
            .blobs()
            .upload_blob("docs", name, name, PublicAccessType::None)
            .await
            .unwrap();
    }

    let both = blobi
        .containers()
        .get_container_properties_and_blobs("docs")
        .await
        .unwrap();
    let names: Vec<_> = both.blobs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(both.blobs[0].content_length, 5);
    assert_eq!(both.properties.name, "docs");
}

#[tokio::test]
async fn set_access_type_changes_existing_container() {
    let (blobi, _) = memory_blobi();
    let containers = blobi.containers();
    containers
        .create_container("docs", PublicAccessType::None)
        .await
        .unwrap();

    containers
        .set_container_access_type("docs", PublicAccessType::Blob)
        .await
        .unwrap();

    assert_eq!(
        containers.get_container_access_type("docs").await.unwrap(),
        PublicAccessType::Blob
    );
}

#[tokio::test]
async fn delete_container_does_not_create_it() {
    let (blobi, backend) = memory_blobi();
    let containers = blobi.containers();

    assert!(!containers.delete_container("Docs").await.unwrap());
    assert!(backend.container_names().is_empty());
    assert_eq!(backend.create_checks(), 0);

    containers
        .create_container("docs", PublicAccessType::None)
        .await
        .unwrap();
    assert!(containers.delete_container("Docs").await.unwrap());
    assert!(backend.container_names().is_empty());
}

#[tokio::test]
async fn container_level_failure_has_empty_blob_name() {
    let (blobi, backend) = memory_blobi();
    backend.set_offline(true);

    let err = blobi.containers().delete_container("Docs").await.unwrap_err();

    match &err {
        StorageError::Operation {
            operation,
            blob,
            container,
            ..
        } => {
            assert_eq!(*operation, "delete_container");
            assert_eq!(blob, "");
            assert_eq!(container, "Docs");
        }
        other => panic!("wrong error {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "delete_container failed for container 'Docs'"
    );
}

#[tokio::test]
async fn append_container_metadata_rejects_existing_keys() {
    let (blobi, _) = memory_blobi();
    let containers = blobi.containers();
    containers
        .create_container_with_metadata("docs", &md(&[("team", "search")]), PublicAccessType::None)
        .await
        .unwrap();

    let err = containers
        .append_container_metadata("docs", &md(&[("Team", "ads"), ("tier", "hot")]))
        .await
        .unwrap_err();
    match &err {
        StorageError::DuplicateMetadataKey {
            key, blob, container, ..
        } => {
            assert_eq!(key, "Team");
            assert_eq!(blob, "");
            assert_eq!(container, "docs");
        }
        other => panic!("wrong error {other:?}"),
    }
    let props = containers.get_container_properties("docs").await.unwrap();
    assert_eq!(props.metadata, md(&[("team", "search")]));

    containers
        .append_container_metadata("docs", &md(&[("tier", "hot")]))
        .await
        .unwrap();
    let props = containers.get_container_properties("docs").await.unwrap();
    assert_eq!(props.metadata, md(&[("team", "search"), ("tier", "hot")]));
}

#[tokio::test]
async fn set_container_metadata_replaces() {
    let (blobi, _) = memory_blobi();
    let containers = blobi.containers();
    containers
        .create_container_with_metadata("docs", &md(&[("team", "search")]), PublicAccessType::None)
        .await
        .unwrap();

    containers
        .set_container_metadata("docs", &md(&[("owner", "ann")]))
        .await
        .unwrap();

    let props = containers.get_container_properties("docs").await.unwrap();
    assert_eq!(props.metadata, md(&[("owner", "ann")]));
}

#[test]
fn models_serialize_access_type_lowercase() {
    let json = serde_json::to_value(PublicAccessType::Container).unwrap();
    assert_eq!(json, serde_json::json!("container"));
}
