//! Shared fixtures for the medboard integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mb_config::{GateConfig, SubmissionConfig};
use mb_core::{
    AssetFile, DraftPost, Identity, ObjectStore, OrphanPolicy, RelationalStore, Session,
};
use mb_services::{
    AccessGate, AnnouncementFeed, AssetUploader, IdentityResolver, PostForm,
    SubmissionOrchestrator,
};
use mb_store_memory::{
    MemoryObjectStore, MemoryProfileStore, MemoryRelationalStore, RecordingNavigator,
};
use tokio::sync::Notify;

pub const CDN: &str = "https://cdn.test/storage/v1/object/public/images";

/// Every collaborator of one page, in memory.
pub struct Harness {
    pub objects: Arc<MemoryObjectStore>,
    pub rows: Arc<MemoryRelationalStore>,
    pub profiles: Arc<MemoryProfileStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub orchestrator: Arc<SubmissionOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(OrphanPolicy::Record)
    }

    pub fn with_policy(policy: OrphanPolicy) -> Self {
        let objects = Arc::new(MemoryObjectStore::new(CDN));
        let rows = Arc::new(MemoryRelationalStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        profiles.add_doctor("u1", "Dr. Grey");
        profiles.add_user("u2", "Sam");

        let orchestrator = SubmissionOrchestrator::new(
            AssetUploader::new(objects.clone(), "post"),
            rows.clone(),
            "posts",
        )
        .with_orphan_policy(policy);

        Self {
            objects,
            rows,
            profiles,
            navigator: Arc::new(RecordingNavigator::new()),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.profiles.clone())
    }

    pub async fn identity(&self, user_id: &str) -> Identity {
        self.resolver().resolve(Some(&Session::new(user_id))).await
    }

    pub fn form(&self) -> PostForm {
        PostForm::new(
            self.orchestrator.clone(),
            self.navigator.clone(),
            &SubmissionConfig::default(),
        )
    }

    pub fn gate(&self) -> AccessGate {
        AccessGate::new(self.navigator.clone(), &GateConfig::default())
    }

    pub fn feed(&self) -> AnnouncementFeed {
        AnnouncementFeed::new(self.rows.clone(), "alerts")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn draft(title: &str, content: &str, location: &str) -> DraftPost {
    DraftPost {
        title: title.into(),
        content: content.into(),
        location: location.into(),
        selected_asset: None,
    }
}

pub fn image(name: &str) -> AssetFile {
    AssetFile::new(name.to_string(), vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
}

/// Object store that parks every write until released, so a test can
/// observe the pipeline mid-flight.
pub struct GatedObjectStore {
    inner: MemoryObjectStore,
    release: Notify,
    entered: Notify,
}

impl GatedObjectStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new(CDN),
            release: Notify::new(),
            entered: Notify::new(),
        }
    }

    /// Resolves once a write is parked.
    pub async fn wait_for_write(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }
}

impl Default for GatedObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for GatedObjectStore {
    async fn put_object(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.put_object(path, bytes, content_type).await
    }

    fn public_url_for(&self, path: &str) -> String {
        self.inner.public_url_for(path)
    }

    async fn delete_object(&self, path: &str) -> anyhow::Result<()> {
        self.inner.delete_object(path).await
    }
}

/// Relational store that refuses every insert but still serves the rows
/// already in `inner`.
pub struct InsertRejectingStore {
    inner: Arc<MemoryRelationalStore>,
}

impl InsertRejectingStore {
    pub fn new(inner: Arc<MemoryRelationalStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RelationalStore for InsertRejectingStore {
    async fn insert(&self, table: &str, _record: serde_json::Value) -> anyhow::Result<()> {
        anyhow::bail!("new row for relation \"{table}\" violates row-level security policy")
    }

    async fn select_all(&self, table: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        self.inner.select_all(table).await
    }
}

impl Harness {
    /// An orchestrator over the same stores whose post inserts all fail.
    pub fn rejecting_orchestrator(&self, policy: OrphanPolicy) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(
            AssetUploader::new(self.objects.clone(), "post"),
            Arc::new(InsertRejectingStore::new(self.rows.clone())),
            "posts",
        )
        .with_orphan_policy(policy)
    }
}
