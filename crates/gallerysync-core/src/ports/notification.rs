//! Notification service port (driven/secondary port)
//!
//! Alerts are fire-and-forget: the caller never waits for delivery and a
//! delivery failure is logged by the caller, never propagated.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.

use serde::{Deserialize, Serialize};

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// An alert to deliver to the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Short subject line
    pub title: String,
    /// Body text with details about the event
    pub body: String,
    pub priority: NotificationPriority,
    /// Category for grouping/filtering (e.g., "sync", "error")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    /// Sets the priority level
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

// ============================================================================
// INotificationService trait
// ============================================================================

/// Port trait for alert delivery
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Sends a notification
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
