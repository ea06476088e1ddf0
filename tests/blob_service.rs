mod common;

use blobi::{services::SOURCE_FULL_URL_KEY, NameKind, PublicAccessType, StorageError};
use bytes::Bytes;
use common::{md, memory_blobi};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn upload_download_round_trip_with_metadata() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();

    let info = blobs
        .upload_blob_with_metadata(
            "docs",
            "report.txt",
            Bytes::from_static(b"quarterly"),
            &md(&[("author", "ann")]),
            PublicAccessType::None,
        )
        .await
        .unwrap();
    assert!(!info.etag.is_empty());

    let download = blobs.download_blob("docs", "report.txt").await.unwrap();
    assert_eq!(download.container_name(), "docs");
    assert_eq!(download.blob_name(), "report.txt");
    assert_eq!(download.bytes().as_ref(), b"quarterly");

    let props = blobs.get_blob_properties("docs", "report.txt").await.unwrap();
    assert_eq!(props.content_length, 9);
    assert_eq!(props.metadata, md(&[("author", "ann")]));
    assert_eq!(props.etag.as_deref(), Some(info.etag.as_str()));
}

#[tokio::test]
async fn upload_overwrites_existing_blob() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();

    blobs
        .upload_blob("docs", "a.txt", "v1", PublicAccessType::None)
        .await
        .unwrap();
    blobs
        .upload_blob("docs", "a.txt", "version two", PublicAccessType::None)
        .await
        .unwrap();

    let download = blobs.download_blob("docs", "a.txt").await.unwrap();
    assert_eq!(download.into_string().unwrap(), "version two");
}

#[tokio::test]
async fn download_to_writer_reports_length() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();
    blobs
        .upload_blob("docs", "a.bin", vec![7u8; 1024], PublicAccessType::None)
        .await
        .unwrap();

    let mut out = Vec::new();
    let written = blobs.download_blob_to("docs", "a.bin", &mut out).await.unwrap();

    assert_eq!(written, 1024);
    assert_eq!(out, vec![7u8; 1024]);
}

#[tokio::test]
async fn delete_if_exists_and_undelete() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();
    blobs
        .upload_blob("docs", "a.txt", "keep me", PublicAccessType::None)
        .await
        .unwrap();

    assert!(blobs.delete_blob_if_exists("docs", "a.txt").await.unwrap());
    assert!(!blobs.delete_blob_if_exists("docs", "a.txt").await.unwrap());
    assert!(!blobs.blob_exists("docs", "a.txt").await.unwrap());

    blobs.undelete_blob("docs", "a.txt").await.unwrap();
    assert!(blobs.blob_exists("docs", "a.txt").await.unwrap());
}

#[tokio::test]
async fn copy_from_uri_stamps_source_metadata() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();
    blobs
        .upload_blob("src", "dir/a.txt", "payload", PublicAccessType::None)
        .await
        .unwrap();

    let source = url::Url::parse("https://acct.blob.core.windows.net/src/dir/a.txt").unwrap();
    let copy = blobs
        .copy_blob_from_uri("Dst", "b.txt", &source, PublicAccessType::Blob)
        .await
        .unwrap();
    assert_eq!(copy.source, source);

    let metadata = blobi.metadata().get_blob_metadata("dst", "b.txt").await.unwrap();
    assert_eq!(
        metadata,
        md(&[
            (SOURCE_FULL_URL_KEY, source.as_str()),
            ("sourceFullPath", "/src/dir/a.txt"),
        ])
    );
    let download = blobs.download_blob("dst", "b.txt").await.unwrap();
    assert_eq!(download.into_string().unwrap(), "payload");
}

#[tokio::test]
async fn abort_of_completed_copy_is_an_operation_error() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();
    blobs
        .upload_blob("src", "a.txt", "payload", PublicAccessType::None)
        .await
        .unwrap();
    let source = url::Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
    let copy = blobs
        .copy_blob_from_uri("dst", "b.txt", &source, PublicAccessType::None)
        .await
        .unwrap();

    let err = blobs
        .abort_copy_blob_from_uri("dst", "b.txt", &copy.copy_id)
        .await
        .unwrap_err();
    assert_eq!(err.operation_name(), Some("abort_copy_blob_from_uri"));
}

#[tokio::test]
async fn snapshot_returns_an_id() {
    let (blobi, _) = memory_blobi();
    let blobs = blobi.blobs();
    blobs
        .upload_blob("docs", "a.txt", "v1", PublicAccessType::None)
        .await
        .unwrap();

    let snapshot = blobs.create_blob_snapshot("docs", "a.txt").await.unwrap();
    assert!(!snapshot.snapshot.is_empty());
}

#[tokio::test]
async fn failures_carry_operation_blob_and_container() {
    let (blobi, _) = memory_blobi();

    let err = blobi
        .blobs()
        .download_blob("Docs", "Missing.txt")
        .await
        .unwrap_err();

    match &err {
        StorageError::Operation {
            operation,
            blob,
            container,
            source,
        } => {
            assert_eq!(*operation, "download_blob");
            assert_eq!(blob, "Missing.txt");
            assert_eq!(container, "Docs");
            assert!(source.to_string().starts_with("BlobNotFound"));
        }
        other => panic!("wrong error {other:?}"),
    }
    assert_eq!(err.operation_name(), Some("download_blob"));
    assert_eq!(err.blob_name(), Some("Missing.txt"));
    assert_eq!(err.container_name(), Some("Docs"));
}

#[tokio::test]
async fn empty_blob_name_is_rejected() {
    let (blobi, _) = memory_blobi();
    let err = blobi
        .blobs()
        .upload_blob("docs", "", "x", PublicAccessType::None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidName(NameKind::Blob)));
}

#[tokio::test]
async fn concurrent_uploads_from_clones() {
    let (blobi, _) = memory_blobi();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let blobi = blobi.clone();
            tokio::spawn(async move {
                blobi
                    .blobs()
                    .upload_blob("docs", &format!("{i}.txt"), i.to_string(), PublicAccessType::None)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let listing = blobi
        .containers()
        .list_container_content("docs")
        .await
        .unwrap();
    assert_eq!(listing.len(), 8);
}
