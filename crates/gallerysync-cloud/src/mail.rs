//! Alert delivery
//!
//! [`ResendNotifier`] sends alerts as plain-text email through the Resend
//! HTTP API. [`LogNotifier`] writes them to the log and is used when no
//! email channel is configured.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use gallerysync_core::ports::{INotificationService, Notification, NotificationPriority};

/// Base URL of the Resend API
pub const RESEND_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Email alerts through Resend (`POST /emails`)
pub struct ResendNotifier {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    to: Vec<String>,
}

impl ResendNotifier {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: RESEND_BASE_URL.to_string(),
            api_key: api_key.into(),
            from: from.into(),
            to,
        }
    }

    /// Overrides the API base URL (useful for testing)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl INotificationService for ResendNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let request = SendEmailRequest {
            from: &self.from,
            to: &self.to,
            subject: &notification.title,
            text: &notification.body,
        };

        self.client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send alert email")?
            .error_for_status()
            .context("Resend rejected alert email")?;

        info!(
            subject = %notification.title,
            recipients = self.to.len(),
            "Alert email sent"
        );
        Ok(())
    }
}

/// Writes alerts to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl INotificationService for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        match notification.priority {
            NotificationPriority::High => warn!(
                category = %notification.category,
                title = %notification.title,
                body = %notification.body,
                "ALERT"
            ),
            _ => info!(
                category = %notification.category,
                title = %notification.title,
                body = %notification.body,
                "Notification"
            ),
        }
        Ok(())
    }
}
