//! Google Drive source collection
//!
//! Albums are the subfolders of a configured root folder; items are the
//! images inside each album folder. Listings go through the Drive v3
//! `files.list` endpoint and follow `nextPageToken` until exhausted.
//!
//! ## Variants
//!
//! - `Original` downloads the file content (`files/{id}?alt=media`)
//! - `Width(px)` downloads the Drive thumbnail rendition at that width
//!   (`thumbnail?id={id}&sz=w{px}`), which Drive serves as JPEG

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use gallerysync_core::domain::{AlbumId, ItemId, SourceAlbum, SourceItem, Variant};
use gallerysync_core::ports::{ISourceCollection, SourceError};

use crate::error_body;

/// Base URL of the Drive API
pub const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com";

/// Base URL of the thumbnail endpoint
pub const DRIVE_THUMBNAIL_BASE_URL: &str = "https://drive.google.com/thumbnail";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,createdTime,modifiedTime)";

// ============================================================================
// Drive API response types
// ============================================================================

/// Response of `GET /drive/v3/files`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// A file resource with the fields requested in `LIST_FIELDS`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    /// Drive encodes int64 values as strings
    size: Option<String>,
    created_time: DateTime<Utc>,
    modified_time: DateTime<Utc>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for the Drive files API
pub struct DriveClient {
    client: Client,
    api_base_url: String,
    thumbnail_base_url: String,
    access_token: String,
    root_folder_id: String,
    page_size: u32,
}

impl DriveClient {
    /// Creates a client listing the albums under `root_folder_id`
    pub fn new(access_token: impl Into<String>, root_folder_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base_url: DRIVE_API_BASE_URL.to_string(),
            thumbnail_base_url: DRIVE_THUMBNAIL_BASE_URL.to_string(),
            access_token: access_token.into(),
            root_folder_id: root_folder_id.into(),
            page_size: 100,
        }
    }

    /// Overrides the API base URL (useful for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the thumbnail base URL (useful for testing)
    pub fn with_thumbnail_base_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.access_token)
    }

    /// Runs a `files.list` query and collects every page
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, SourceError> {
        let url = format!("{}/drive/v3/files", self.api_base_url);
        let page_size = self.page_size.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("q", query),
                ("fields", LIST_FIELDS),
                ("orderBy", "name"),
                ("pageSize", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .get(&url)
                .query(&params)
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response, query).await?;

            let page: FileListResponse = response
                .json()
                .await
                .map_err(|e| SourceError::Malformed(format!("files.list response: {}", e)))?;

            pages += 1;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(pages, count = files.len(), "Drive listing complete");
        Ok(files)
    }

    /// Downloads a URL into memory
    async fn download(&self, url: &str, what: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.get(url).send().await.map_err(transport_error)?;
        let response = check_status(response, what).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    SourceError::Transient(e.to_string())
}

/// Maps non-success responses to typed errors
async fn check_status(response: Response, what: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = error_body(response).await;
    let message = format!("{} ({}): {}", what, status.as_u16(), body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(message),
        StatusCode::NOT_FOUND => SourceError::NotFound(message),
        StatusCode::BAD_REQUEST => SourceError::Malformed(message),
        _ => SourceError::Transient(message),
    })
}

/// Escapes a value for use inside a single-quoted Drive query literal
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait::async_trait]
impl ISourceCollection for DriveClient {
    #[tracing::instrument(skip(self), fields(root = %self.root_folder_id))]
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, SourceError> {
        let query = format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            quote(&self.root_folder_id),
            FOLDER_MIME_TYPE
        );
        let files = self.list_files(&query).await?;

        let albums = files
            .into_iter()
            .filter_map(|f| match AlbumId::new(f.id.clone()) {
                Ok(id) => Some(SourceAlbum::new(id, f.name, f.created_time, f.modified_time)),
                Err(e) => {
                    warn!(id = %f.id, error = %e, "Skipping folder with unusable ID");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(count = albums.len(), "Albums listed");
        Ok(albums)
    }

    #[tracing::instrument(skip(self))]
    async fn list_items(&self, album: &AlbumId) -> Result<Vec<SourceItem>, SourceError> {
        let query = format!(
            "'{}' in parents and mimeType contains 'image/' and trashed=false",
            quote(album.as_str())
        );
        let files = self.list_files(&query).await?;

        let items = files
            .into_iter()
            .filter_map(|f| {
                let size = f.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0);
                match ItemId::new(f.id.clone()) {
                    Ok(id) => Some(SourceItem::new(
                        id,
                        f.name,
                        size,
                        f.mime_type,
                        f.created_time,
                        f.modified_time,
                    )),
                    Err(e) => {
                        warn!(id = %f.id, error = %e, "Skipping file with unusable ID");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        debug!(count = items.len(), "Items listed");
        Ok(items)
    }

    async fn fetch_variant(
        &self,
        item: &SourceItem,
        variant: Variant,
    ) -> Result<Vec<u8>, SourceError> {
        let url = match variant {
            Variant::Original => format!(
                "{}/drive/v3/files/{}?alt=media",
                self.api_base_url,
                item.id()
            ),
            Variant::Width(px) => self.variant_url(item.id(), px),
        };

        let bytes = self
            .download(&url, &format!("item {} variant {}", item.id(), variant))
            .await?;
        debug!(item = %item.id(), %variant, size = bytes.len(), "Variant fetched");
        Ok(bytes)
    }

    fn variant_url(&self, item: &ItemId, width: u32) -> String {
        format!("{}?id={}&sz=w{}", self.thumbnail_base_url, item, width)
    }
}
