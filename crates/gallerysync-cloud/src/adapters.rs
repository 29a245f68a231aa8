//! Adapter wiring from configuration
//!
//! Both binaries build their remote adapters here, so the Drive, S3 and
//! alert setup is the same wherever a sync runs.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use gallerysync_core::config::{
    Config, ENV_DRIVE_TOKEN, ENV_S3_ACCESS_KEY_ID, ENV_S3_SECRET_ACCESS_KEY,
};
use gallerysync_core::ports::{IBlobStore, INotificationService, ISourceCollection};

use crate::{Credentials, DriveClient, LogNotifier, ResendNotifier, S3BlobStore};

/// The remote side of a sync: source, destination and alert channel
pub struct CloudAdapters {
    pub source: Arc<dyn ISourceCollection>,
    pub blob_store: Arc<dyn IBlobStore>,
    pub notifier: Arc<dyn INotificationService>,
}

impl CloudAdapters {
    /// Validates `config` and builds every adapter
    ///
    /// # Errors
    ///
    /// Fails on any validation error, or when the Drive token or the S3
    /// credentials are missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.ensure_valid()?;

        let Some(token) = config.source.access_token.as_deref() else {
            bail!("No Drive access token. Set {}.", ENV_DRIVE_TOKEN);
        };
        let source = DriveClient::new(token, config.source.root_folder_id.as_str())
            .with_api_base_url(config.source.api_base_url.as_str())
            .with_thumbnail_base_url(config.source.thumbnail_base_url.as_str())
            .with_page_size(config.source.page_size);

        let (Some(key_id), Some(secret)) = (
            config.blob_store.access_key_id.as_deref(),
            config.blob_store.secret_access_key.as_deref(),
        ) else {
            bail!(
                "No S3 credentials. Set {} and {}.",
                ENV_S3_ACCESS_KEY_ID,
                ENV_S3_SECRET_ACCESS_KEY
            );
        };
        let blob_store = S3BlobStore::new(
            &config.blob_store.endpoint,
            &config.blob_store.bucket,
            config.blob_store.region.as_str(),
            Credentials::new(key_id, secret),
        )?
        .with_public_base_url(config.blob_store.public_base());

        Ok(Self {
            source: Arc::new(source),
            blob_store: Arc::new(blob_store),
            notifier: notifier(config),
        })
    }
}

/// Resend when an API key, a sender and recipients are configured, the log
/// otherwise
fn notifier(config: &Config) -> Arc<dyn INotificationService> {
    let alerts = &config.alerts;
    match (&alerts.resend_api_key, &alerts.from) {
        (Some(api_key), Some(from)) if !alerts.to.is_empty() => Arc::new(
            ResendNotifier::new(api_key.as_str(), from.as_str(), alerts.to.clone())
                .with_base_url(alerts.resend_base_url.as_str()),
        ),
        _ => {
            debug!("Email alerts not configured, alerts go to the log");
            Arc::new(LogNotifier::new())
        }
    }
}
