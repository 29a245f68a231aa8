//! S3-compatible blob store client
//!
//! Path-style requests (`{endpoint}/{bucket}/{key}`) signed with SigV4,
//! which works against AWS S3 as well as MinIO, R2 and similar services.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gallerysync_cloud::{Credentials, S3BlobStore};
//! use gallerysync_core::ports::IBlobStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = S3BlobStore::new(
//!     "https://s3.eu-central-1.amazonaws.com",
//!     "my-photos",
//!     "eu-central-1",
//!     Credentials::new("AKIA...", "secret"),
//! )?;
//! store.put("hello.txt", b"hi".to_vec(), "text/plain", true).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, trace};
use url::Url;

use gallerysync_core::ports::{BlobStoreError, IBlobStore};

use crate::error_body;
use crate::signing::{self, Credentials, SignableRequest, AMZ_DATE_FORMAT};

const SERVICE: &str = "s3";

/// Blob store backed by an S3-compatible HTTP API
pub struct S3BlobStore {
    client: Client,
    /// Scheme and authority of the endpoint, no trailing slash
    origin: String,
    /// `Host` header value the request will carry
    host: String,
    /// Path prefix of the endpoint plus the bucket, no trailing slash
    bucket_path: String,
    region: String,
    credentials: Credentials,
    public_base: String,
}

impl S3BlobStore {
    /// Creates a client for `bucket` at `endpoint`
    ///
    /// Public URLs default to `{endpoint}/{bucket}/{key}`.
    pub fn new(
        endpoint: &str,
        bucket: &str,
        region: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        let url = Url::parse(endpoint).with_context(|| format!("Invalid S3 endpoint: {endpoint}"))?;
        let host_name = url
            .host_str()
            .with_context(|| format!("S3 endpoint has no host: {endpoint}"))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };
        let origin = format!("{}://{}", url.scheme(), host);
        let prefix = url.path().trim_end_matches('/');
        let bucket_path = format!("{}/{}", prefix, signing::uri_encode(bucket, true));

        Ok(Self {
            client: Client::new(),
            public_base: format!("{}{}", origin, bucket_path),
            origin,
            host,
            bucket_path,
            region: region.into(),
            credentials,
        })
    }

    /// Overrides the base of public URLs (e.g. a CDN in front of the bucket)
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Encoded absolute path of an object
    fn object_path(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_path, signing::uri_encode(key, false))
    }

    /// Signs and sends a request for `key`
    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(&str, &str)],
    ) -> Result<Response, BlobStoreError> {
        let path = self.object_path(key);
        let now = Utc::now();
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let payload_sha256 = match &body {
            Some(bytes) => signing::sha256_hex(bytes),
            None => signing::EMPTY_PAYLOAD_SHA256.to_string(),
        };

        let mut headers: Vec<(&str, &str)> = vec![
            ("host", self.host.as_str()),
            ("x-amz-content-sha256", payload_sha256.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        headers.extend_from_slice(extra_headers);

        let signature = signing::sign(
            &SignableRequest {
                method: method.as_str(),
                path: &path,
                query: &[],
                headers: &headers,
                payload_sha256: &payload_sha256,
            },
            &self.credentials,
            &self.region,
            SERVICE,
            now,
        );

        let url = format!("{}{}", self.origin, path);
        trace!(%method, %url, signed_headers = %signature.signed_headers, "S3 request");

        // reqwest derives Host from the URL
        let mut request = self
            .client
            .request(method, &url)
            .header("authorization", signature.authorization);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        request
            .send()
            .await
            .map_err(|e| BlobStoreError::Network(e.to_string()))
    }
}

/// Maps a non-success response to a typed error
async fn status_error(response: Response) -> BlobStoreError {
    let status = response.status().as_u16();
    let body = error_body(response).await;
    match status {
        401 | 403 => BlobStoreError::Unauthorized { status, body },
        _ => BlobStoreError::Status { status, body },
    }
}

#[async_trait::async_trait]
impl IBlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        is_public: bool,
    ) -> Result<(), BlobStoreError> {
        let size = bytes.len();
        let mut headers = vec![("content-type", content_type)];
        if is_public {
            headers.push(("x-amz-acl", "public-read"));
        }

        let response = self.send(Method::PUT, key, Some(bytes), &headers).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        debug!(key, size, is_public, "Object uploaded");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobStoreError> {
        let response = self.send(Method::GET, key, None, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobStoreError::Network(e.to_string()))?;
        debug!(key, size = bytes.len(), "Object downloaded");
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        let response = self.send(Method::DELETE, key, None, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            debug!(key, "Object deleted");
            return Ok(());
        }
        Err(status_error(response).await)
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        let response = self.send(Method::HEAD, key, None, &[]).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, signing::uri_encode(key, false))
    }
}
