//! Gallerysync Cloud - Adapters for the external services
//!
//! Provides async clients for:
//! - Google Drive v3 as the source collection (albums are folders)
//! - S3-compatible object storage with AWS Signature V4
//! - Resend email API for failure alerts
//!
//! ## Modules
//!
//! - [`drive`] - `ISourceCollection` over the Drive files API
//! - [`s3`] - `IBlobStore` over path-style S3 requests
//! - [`signing`] - AWS Signature V4 request signing
//! - [`mail`] - `INotificationService` implementations (Resend, log)
//! - [`adapters`] - All of the above, wired from the configuration

pub mod adapters;
pub mod drive;
pub mod mail;
pub mod s3;
pub mod signing;

pub use adapters::CloudAdapters;
pub use drive::DriveClient;
pub use mail::{LogNotifier, ResendNotifier};
pub use s3::S3BlobStore;
pub use signing::Credentials;

/// Reads an error response body, keeping it short enough for logs
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    const MAX_BODY: usize = 512;

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_BODY {
        let mut cut = MAX_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
