//! Integration tests for the Drive source adapter
//!
//! - Album listing with the folder query
//! - Item listing with pagination
//! - Error classification (401, 404, 500)
//! - Variant downloads (original and thumbnail)

use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use gallerysync_core::domain::{AlbumId, ItemId, SourceItem, Variant};
use gallerysync_core::ports::{ISourceCollection, SourceError};

use crate::common;

#[tokio::test]
async fn test_list_albums_queries_root_folders() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(bearer_token("test-access-token"))
        .and(query_param(
            "q",
            "'root-folder' in parents and mimeType='application/vnd.google-apps.folder' and trashed=false",
        ))
        .and(query_param("orderBy", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                common::drive_file("albumA", "A", "application/vnd.google-apps.folder", "2026-02-01T00:00:00Z"),
                common::drive_file("albumB", "B", "application/vnd.google-apps.folder", "2026-02-02T00:00:00Z")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let albums = client.list_albums().await.expect("list albums");
    assert_eq!(albums.len(), 2);
    assert_eq!(albums[0].id().as_str(), "albumA");
    assert_eq!(albums[1].name(), "B");
}

#[tokio::test]
async fn test_list_items_follows_pages() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [common::drive_file("img3", "c.jpg", "image/jpeg", "2026-02-01T00:00:00Z")]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'albumA' in parents and mimeType contains 'image/' and trashed=false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                common::drive_file("img1", "a.jpg", "image/jpeg", "2026-02-01T00:00:00Z"),
                common::drive_file("img2", "b.png", "image/png", "2026-02-01T00:00:00Z")
            ],
            "nextPageToken": "page-2"
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let album = AlbumId::new("albumA".to_string()).unwrap();
    let items = client.list_items(&album).await.expect("list items");

    let ids: Vec<_> = items.iter().map(|i| i.id().as_str().to_string()).collect();
    assert_eq!(ids, vec!["img1", "img2", "img3"]);
    assert_eq!(items[1].media_type(), "image/png");
    assert_eq!(items[0].size_bytes(), 1024);
}

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let err = client.list_albums().await.unwrap_err();
    assert!(matches!(err, SourceError::Unauthorized(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_missing_album_is_not_found() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
        .mount(&server)
        .await;

    let album = AlbumId::new("gone".to_string()).unwrap();
    let err = client.list_items(&album).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.list_albums().await.unwrap_err();
    assert!(matches!(err, SourceError::Transient(_)));
}

#[tokio::test]
async fn test_fetch_original_and_thumbnail() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/img1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"original-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/thumbnail"))
        .and(query_param("id", "img1"))
        .and(query_param("sz", "w400"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let item = SourceItem::new(
        ItemId::new("img1".to_string()).unwrap(),
        "a.jpg",
        14,
        "image/jpeg",
        chrono::Utc::now(),
        chrono::Utc::now(),
    );

    let original = client.fetch_variant(&item, Variant::Original).await.unwrap();
    assert_eq!(original, b"original-bytes");

    let thumb = client.fetch_variant(&item, Variant::Width(400)).await.unwrap();
    assert_eq!(thumb, b"thumb-bytes");
}
