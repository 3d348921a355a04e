//! # mb-store-memory
//!
//! In-process implementations of every medboard port, backed by [`DashMap`].
//! Used by tests and local demos; nothing survives a restart.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use mb_core::{Navigator, ObjectStore, ProfileStore, RelationalStore, Session, SessionProvider};

/// An object as written by [`MemoryObjectStore::put_object`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Object store keyed by path. Writes to an existing path replace it.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
    /// Public URL prefix (e.g., "https://cdn.example/images")
    url_prefix: String,
    writes: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.get(path).map(|o| o.value().clone())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of successful `put_object` calls, overwrites included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()> {
        if path.is_empty() || path.starts_with('/') {
            anyhow::bail!("invalid object path {path:?}");
        }
        self.objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn public_url_for(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }

    async fn delete_object(&self, path: &str) -> anyhow::Result<()> {
        match self.objects.remove(path) {
            Some(_) => Ok(()),
            None => anyhow::bail!("object not found: {path}"),
        }
    }
}

/// Tables of JSON rows, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRelationalStore {
    tables: DashMap<String, Vec<serde_json::Value>>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `table`, empty if the table was never written.
    pub fn rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RelationalStore for MemoryRelationalStore {
    async fn insert(&self, table: &str, record: serde_json::Value) -> anyhow::Result<()> {
        if !record.is_object() {
            anyhow::bail!("record for table {table} must be a JSON object");
        }
        self.tables.entry(table.to_string()).or_default().push(record);
        Ok(())
    }

    async fn select_all(&self, table: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(self.rows(table))
    }
}

/// Doctor records and display names.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    doctors: DashSet<String>,
    names: DashMap<String, String>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: &str, display_name: &str) {
        self.names.insert(user_id.to_string(), display_name.to_string());
    }

    pub fn add_doctor(&self, user_id: &str, display_name: &str) {
        self.add_user(user_id, display_name);
        self.doctors.insert(user_id.to_string());
    }

    pub fn revoke_doctor(&self, user_id: &str) {
        self.doctors.remove(user_id);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn has_doctor_record(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.doctors.contains(user_id))
    }

    async fn display_name(&self, user_id: &str) -> anyhow::Result<String> {
        self.names
            .get(user_id)
            .map(|name| name.value().clone())
            .ok_or_else(|| anyhow::anyhow!("no profile for user {user_id}"))
    }
}

/// Hands out a fixed session, or none.
#[derive(Debug, Default)]
pub struct StaticSessionProvider {
    session: Option<Session>,
}

impl StaticSessionProvider {
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.session.clone())
    }
}

/// Navigator that remembers every redirect instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        tracing::debug!(redirect_to = target, "recorded redirect");
        match self.targets.lock() {
            Ok(mut targets) => targets.push(target.to_string()),
            Err(poisoned) => poisoned.into_inner().push(target.to_string()),
        }
    }
}
