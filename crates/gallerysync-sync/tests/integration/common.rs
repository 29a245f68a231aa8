//! Shared fixtures for sync integration tests
//!
//! The source and the blob store are in-memory fakes; the checkpoint store
//! is the real SQLite adapter on an in-memory database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;

use gallerysync_cache::{DatabasePool, SqliteCheckpointStore};
use gallerysync_core::config::{Config, ConfigBuilder};
use gallerysync_core::domain::{AlbumId, ItemId, SourceAlbum, SourceItem, Variant};
use gallerysync_core::ports::{
    BlobStoreError, IBlobStore, ICheckpointStore, INotificationService, ISourceCollection,
    Notification, SourceError,
};
use gallerysync_sync::{Scheduler, SyncEngine};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn album_id(id: &str) -> AlbumId {
    AlbumId::new(id.to_string()).unwrap()
}

pub fn item_id(id: &str) -> ItemId {
    ItemId::new(id.to_string()).unwrap()
}

// ============================================================================
// FakeSource
// ============================================================================

/// Source collection held in memory, in insertion order
#[derive(Default)]
pub struct FakeSource {
    albums: Mutex<Vec<(SourceAlbum, Vec<SourceItem>)>>,
    /// Albums still listed but whose item listing returns NotFound
    vanished: Mutex<HashSet<AlbumId>>,
    failing: Mutex<HashSet<ItemId>>,
    unauthorized: AtomicBool,
    fetches: Mutex<HashMap<ItemId, usize>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an album with `count` JPEG items named `{id}1..{id}N`
    pub fn add_album(&self, id: &str, count: usize) {
        let album = SourceAlbum::new(album_id(id), format!("Album {id}"), ts(1_000), ts(1_000));
        let items = (1..=count)
            .map(|n| {
                SourceItem::new(
                    item_id(&format!("{id}{n}")),
                    format!("{id}{n}.jpg"),
                    1_024,
                    "image/jpeg",
                    ts(1_000 + n as i64),
                    ts(1_000 + n as i64),
                )
            })
            .collect();
        self.albums.lock().unwrap().push((album, items));
    }

    /// Adds an item created at `created`
    pub fn add_item(&self, album: &str, id: &str, created: DateTime<Utc>) {
        let mut albums = self.albums.lock().unwrap();
        let (_, items) = albums
            .iter_mut()
            .find(|(a, _)| a.id().as_str() == album)
            .expect("album exists");
        items.push(SourceItem::new(
            item_id(id),
            format!("{id}.jpg"),
            2_048,
            "image/jpeg",
            created,
            created,
        ));
    }

    /// Moves an item's modification time
    pub fn touch_item(&self, album: &str, id: &str, modified: DateTime<Utc>) {
        let mut albums = self.albums.lock().unwrap();
        let (_, items) = albums
            .iter_mut()
            .find(|(a, _)| a.id().as_str() == album)
            .expect("album exists");
        let item = items
            .iter_mut()
            .find(|i| i.id().as_str() == id)
            .expect("item exists");
        *item = SourceItem::new(
            item.id().clone(),
            item.name(),
            item.size_bytes(),
            item.media_type(),
            item.created_at(),
            modified,
        );
    }

    /// Lists the albums in reverse order from now on
    pub fn reverse_albums(&self) {
        self.albums.lock().unwrap().reverse();
    }

    pub fn vanish_album(&self, id: &str) {
        self.vanished.lock().unwrap().insert(album_id(id));
    }

    pub fn fail_item(&self, id: &str) {
        self.failing.lock().unwrap().insert(item_id(id));
    }

    pub fn heal_item(&self, id: &str) {
        self.failing.lock().unwrap().remove(&item_id(id));
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    /// Variant downloads attempted for an item
    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(&item_id(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.albums
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, items)| items.iter().map(|i| i.id().to_string()))
            .collect()
    }

    fn check_auth(&self) -> Result<(), SourceError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(SourceError::Unauthorized("401 token expired".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ISourceCollection for FakeSource {
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, SourceError> {
        self.check_auth()?;
        Ok(self
            .albums
            .lock()
            .unwrap()
            .iter()
            .map(|(a, _)| a.clone())
            .collect())
    }

    async fn list_items(&self, album: &AlbumId) -> Result<Vec<SourceItem>, SourceError> {
        self.check_auth()?;
        if self.vanished.lock().unwrap().contains(album) {
            return Err(SourceError::NotFound(album.to_string()));
        }
        self.albums
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _)| a.id() == album)
            .map(|(_, items)| items.clone())
            .ok_or_else(|| SourceError::NotFound(album.to_string()))
    }

    async fn fetch_variant(
        &self,
        item: &SourceItem,
        variant: Variant,
    ) -> Result<Vec<u8>, SourceError> {
        self.check_auth()?;
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(item.id().clone())
            .or_default() += 1;
        if self.failing.lock().unwrap().contains(item.id()) {
            return Err(SourceError::Transient(format!("503 for {}", item.id())));
        }
        Ok(format!("{}-{}", item.id(), variant).into_bytes())
    }

    fn variant_url(&self, item: &ItemId, width: u32) -> String {
        format!("https://thumbs.test/{item}?w={width}")
    }
}

// ============================================================================
// MemoryBlobStore
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub is_public: bool,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
    unauthorized: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: "application/octet-stream".into(),
                is_public: true,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn json<T: DeserializeOwned>(&self, key: &str) -> T {
        let object = self.object(key).unwrap_or_else(|| panic!("{key} missing"));
        serde_json::from_slice(&object.bytes).unwrap()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of uploads under `images/`
    pub fn image_puts(&self) -> usize {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with("images/"))
            .count()
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    fn check_auth(&self) -> Result<(), BlobStoreError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Unauthorized {
                status: 403,
                body: "SignatureDoesNotMatch".into(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IBlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        is_public: bool,
    ) -> Result<(), BlobStoreError> {
        self.check_auth()?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                is_public,
            },
        );
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobStoreError> {
        self.check_auth()?;
        Ok(self.object(key).map(|o| o.bytes))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.check_auth()?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        self.check_auth()?;
        Ok(self.contains(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// LeaseLosingStore
// ============================================================================

/// SQLite store whose lease is taken away after `grants` acquisitions
pub struct LeaseLosingStore {
    inner: Arc<SqliteCheckpointStore>,
    grants: usize,
    attempts: AtomicUsize,
}

impl LeaseLosingStore {
    pub fn new(inner: Arc<SqliteCheckpointStore>, grants: usize) -> Self {
        Self {
            inner,
            grants,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ICheckpointStore for LeaseLosingStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.delete(key).await
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) >= self.grants {
            return Ok(false);
        }
        self.inner.try_acquire_lease(name, holder, ttl).await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> anyhow::Result<()> {
        self.inner.release_lease(name, holder).await
    }
}

// ============================================================================
// Harness
// ============================================================================

/// One 400px width plus the original
pub fn test_config() -> ConfigBuilder {
    ConfigBuilder::new()
        .collection("gallery")
        .variant_widths(vec![400])
        .include_original(true)
        .alerts_failure_threshold(3)
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub blob: Arc<MemoryBlobStore>,
    pub store: Arc<SqliteCheckpointStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Config,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config().build()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let pool = DatabasePool::in_memory().await.unwrap();
        Self {
            source: Arc::new(FakeSource::new()),
            blob: Arc::new(MemoryBlobStore::new()),
            store: Arc::new(SqliteCheckpointStore::new(pool.pool().clone())),
            notifier: Arc::new(RecordingNotifier::default()),
            config,
        }
    }

    /// The two-album source used by most tests: A(3), B(2)
    pub async fn with_two_albums() -> Self {
        let harness = Self::new().await;
        harness.source.add_album("A", 3);
        harness.source.add_album("B", 2);
        harness
    }

    pub fn engine(&self) -> SyncEngine {
        self.engine_over(self.store.clone())
    }

    /// Engine over another checkpoint store, sharing the fakes
    pub fn engine_over(&self, store: Arc<dyn ICheckpointStore>) -> SyncEngine {
        SyncEngine::new(
            self.source.clone(),
            self.blob.clone(),
            store,
            self.notifier.clone(),
            &self.config,
        )
        .unwrap()
        .with_holder("test-holder")
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.engine())
    }
}
