//! Configuration module for gallerysync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides for secrets, and a
//! builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::CollectionName;
use crate::domain::variant::Variant;

/// Environment variable holding the Drive bearer token.
pub const ENV_DRIVE_TOKEN: &str = "GALLERYSYNC_DRIVE_TOKEN";
/// Environment variable holding the S3 access key ID.
pub const ENV_S3_ACCESS_KEY_ID: &str = "GALLERYSYNC_S3_ACCESS_KEY_ID";
/// Environment variable holding the S3 secret access key.
pub const ENV_S3_SECRET_ACCESS_KEY: &str = "GALLERYSYNC_S3_SECRET_ACCESS_KEY";
/// Environment variable holding the Resend API key.
pub const ENV_RESEND_API_KEY: &str = "GALLERYSYNC_RESEND_API_KEY";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for gallerysync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the synced collection (key in `metadata/version.json`).
    pub collection: String,
    pub source: SourceConfig,
    pub blob_store: BlobStoreConfig,
    pub variants: VariantsConfig,
    pub sync: SyncConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
}

/// Google Drive source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Drive folder whose subfolders are the albums.
    pub root_folder_id: String,
    /// Base URL of the Drive API.
    pub api_base_url: String,
    /// Base URL of the thumbnail endpoint used for width variants.
    pub thumbnail_base_url: String,
    /// Page size for file listings.
    pub page_size: u32,
    /// OAuth bearer token. Prefer `GALLERYSYNC_DRIVE_TOKEN`.
    pub access_token: Option<String>,
}

/// S3-compatible blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Service endpoint, e.g. `https://s3.eu-central-1.amazonaws.com`.
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    /// Prefer `GALLERYSYNC_S3_ACCESS_KEY_ID`.
    pub access_key_id: Option<String>,
    /// Prefer `GALLERYSYNC_S3_SECRET_ACCESS_KEY`.
    pub secret_access_key: Option<String>,
    /// Base URL objects are served from. Defaults to `{endpoint}/{bucket}`.
    pub public_base_url: Option<String>,
}

/// Renditions published for every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantsConfig {
    /// Widths in pixels of the resized JPEG renditions.
    pub widths: Vec<u32>,
    /// Whether the untouched source bytes are published too.
    pub include_original: bool,
}

/// Sync engine and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Wall-clock budget of a single run, in seconds.
    pub budget_secs: u64,
    /// Seconds between daemon ticks.
    pub poll_interval: u64,
    /// Failed uploads after which an item is no longer retried. `None` retries forever.
    pub max_item_attempts: Option<u32>,
    /// Lifetime of the run lease, in seconds. Must outlive a run.
    pub lease_ttl_secs: u64,
}

/// Failure alerting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Consecutive run failures that trigger an alert.
    pub failure_threshold: u32,
    /// Prefer `GALLERYSYNC_RESEND_API_KEY`. Without a key alerts go to the log.
    pub resend_api_key: Option<String>,
    pub resend_base_url: String,
    /// Sender address for alert emails.
    pub from: Option<String>,
    /// Recipients of alert emails.
    pub to: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Local state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// SQLite database holding checkpoints, failure state and leases.
    pub db_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/gallerysync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("gallerysync")
            .join("config.yaml")
    }

    /// Overlay secrets from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Overlay secrets from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = get(ENV_DRIVE_TOKEN) {
            self.source.access_token = Some(token);
        }
        if let Some(key_id) = get(ENV_S3_ACCESS_KEY_ID) {
            self.blob_store.access_key_id = Some(key_id);
        }
        if let Some(secret) = get(ENV_S3_SECRET_ACCESS_KEY) {
            self.blob_store.secret_access_key = Some(secret);
        }
        if let Some(api_key) = get(ENV_RESEND_API_KEY) {
            self.alerts.resend_api_key = Some(api_key);
        }
    }

    /// The collection name, validated.
    pub fn collection_name(&self) -> anyhow::Result<CollectionName> {
        Ok(CollectionName::new(self.collection.clone())?)
    }

    /// A copy with every secret replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.source.access_token = mask(&self.source.access_token);
        copy.blob_store.access_key_id = mask(&self.blob_store.access_key_id);
        copy.blob_store.secret_access_key = mask(&self.blob_store.secret_access_key);
        copy.alerts.resend_api_key = mask(&self.alerts.resend_api_key);
        copy
    }
}

impl SyncConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

impl VariantsConfig {
    /// Every rendition an item must have to count as complete, widths first.
    pub fn required(&self) -> Vec<Variant> {
        let mut variants: Vec<Variant> = self.widths.iter().map(|w| Variant::Width(*w)).collect();
        variants.sort();
        variants.dedup();
        if self.include_original {
            variants.push(Variant::Original);
        }
        variants
    }
}

impl BlobStoreConfig {
    /// Base URL for public object links.
    pub fn public_base(&self) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/{}", self.endpoint.trim_end_matches('/'), self.bucket),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: "gallery".to_string(),
            source: SourceConfig::default(),
            blob_store: BlobStoreConfig::default(),
            variants: VariantsConfig::default(),
            sync: SyncConfig::default(),
            alerts: AlertsConfig::default(),
            logging: LoggingConfig::default(),
            state: StateConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root_folder_id: String::new(),
            api_base_url: "https://www.googleapis.com".to_string(),
            thumbnail_base_url: "https://drive.google.com/thumbnail".to_string(),
            page_size: 100,
            access_token: None,
        }
    }
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
        }
    }
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            widths: vec![400, 800, 1600],
            include_original: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            budget_secs: 300,
            poll_interval: 600,
            max_item_attempts: None,
            lease_ttl_secs: 900,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            resend_api_key: None,
            resend_base_url: "https://api.resend.com".to_string(),
            from: None,
            to: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("gallerysync")
                .join("state.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.budget_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Secrets are not
    /// checked here since they usually arrive through the environment.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        if let Err(e) = CollectionName::new(self.collection.clone()) {
            push("collection", e.to_string());
        }

        // --- source ---
        if self.source.root_folder_id.trim().is_empty() {
            push("source.root_folder_id", "must not be empty".into());
        }
        if !is_http_url(&self.source.api_base_url) {
            push("source.api_base_url", "must be an http(s) URL".into());
        }
        if !is_http_url(&self.source.thumbnail_base_url) {
            push("source.thumbnail_base_url", "must be an http(s) URL".into());
        }
        if self.source.page_size == 0 || self.source.page_size > 1000 {
            push("source.page_size", "must be between 1 and 1000".into());
        }

        // --- blob_store ---
        if !is_http_url(&self.blob_store.endpoint) {
            push("blob_store.endpoint", "must be an http(s) URL".into());
        }
        if self.blob_store.bucket.trim().is_empty() {
            push("blob_store.bucket", "must not be empty".into());
        }
        if self.blob_store.region.trim().is_empty() {
            push("blob_store.region", "must not be empty".into());
        }
        if let Some(base) = &self.blob_store.public_base_url {
            if !is_http_url(base) {
                push("blob_store.public_base_url", "must be an http(s) URL".into());
            }
        }

        // --- variants ---
        if self.variants.widths.is_empty() && !self.variants.include_original {
            push(
                "variants",
                "at least one width or the original must be published".into(),
            );
        }
        if self.variants.widths.contains(&0) {
            push("variants.widths", "widths must be greater than 0".into());
        }

        // --- sync ---
        if self.sync.budget_secs == 0 {
            push("sync.budget_secs", "must be greater than 0".into());
        }
        if self.sync.poll_interval == 0 {
            push("sync.poll_interval", "must be greater than 0".into());
        }
        if self.sync.max_item_attempts == Some(0) {
            push("sync.max_item_attempts", "must be greater than 0 when set".into());
        }
        if self.sync.lease_ttl_secs <= self.sync.budget_secs {
            push(
                "sync.lease_ttl_secs",
                format!(
                    "({}) must be greater than sync.budget_secs ({})",
                    self.sync.lease_ttl_secs, self.sync.budget_secs
                ),
            );
        }

        // --- alerts ---
        if self.alerts.failure_threshold == 0 {
            push("alerts.failure_threshold", "must be greater than 0".into());
        }
        if !is_http_url(&self.alerts.resend_base_url) {
            push("alerts.resend_base_url", "must be an http(s) URL".into());
        }
        if self.alerts.resend_api_key.is_some() {
            if self.alerts.from.as_deref().map_or(true, str::is_empty) {
                push("alerts.from", "required when email alerts are enabled".into());
            }
            if self.alerts.to.is_empty() {
                push("alerts.to", "required when email alerts are enabled".into());
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }

    /// Fails with every validation error joined, for callers about to run
    /// with this configuration.
    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Invalid configuration: {}", joined.join("; "))
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// ```
/// use gallerysync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .source_root_folder_id("folder123")
///     .blob_store_bucket("photos")
///     .sync_budget_secs(120)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    // --- source ---

    pub fn source_root_folder_id(mut self, id: impl Into<String>) -> Self {
        self.config.source.root_folder_id = id.into();
        self
    }

    pub fn source_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.source.api_base_url = url.into();
        self
    }

    pub fn source_thumbnail_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.source.thumbnail_base_url = url.into();
        self
    }

    pub fn source_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.source.access_token = Some(token.into());
        self
    }

    // --- blob_store ---

    pub fn blob_store_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.blob_store.endpoint = endpoint.into();
        self
    }

    pub fn blob_store_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.blob_store.bucket = bucket.into();
        self
    }

    pub fn blob_store_region(mut self, region: impl Into<String>) -> Self {
        self.config.blob_store.region = region.into();
        self
    }

    pub fn blob_store_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.config.blob_store.access_key_id = Some(access_key_id.into());
        self.config.blob_store.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn blob_store_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.blob_store.public_base_url = Some(url.into());
        self
    }

    // --- variants ---

    pub fn variant_widths(mut self, widths: Vec<u32>) -> Self {
        self.config.variants.widths = widths;
        self
    }

    pub fn include_original(mut self, include: bool) -> Self {
        self.config.variants.include_original = include;
        self
    }

    // --- sync ---

    pub fn sync_budget_secs(mut self, secs: u64) -> Self {
        self.config.sync.budget_secs = secs;
        self
    }

    pub fn sync_poll_interval(mut self, secs: u64) -> Self {
        self.config.sync.poll_interval = secs;
        self
    }

    pub fn sync_max_item_attempts(mut self, attempts: u32) -> Self {
        self.config.sync.max_item_attempts = Some(attempts);
        self
    }

    pub fn sync_lease_ttl_secs(mut self, secs: u64) -> Self {
        self.config.sync.lease_ttl_secs = secs;
        self
    }

    // --- alerts ---

    pub fn alerts_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.alerts.failure_threshold = threshold;
        self
    }

    pub fn alerts_email(
        mut self,
        api_key: impl Into<String>,
        from: impl Into<String>,
        to: Vec<String>,
    ) -> Self {
        self.config.alerts.resend_api_key = Some(api_key.into());
        self.config.alerts.from = Some(from.into());
        self.config.alerts.to = to;
        self
    }

    // --- logging / state ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn state_db_path(mut self, path: PathBuf) -> Self {
        self.config.state.db_path = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
