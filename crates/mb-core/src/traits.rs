//! # Core Traits (Ports)
//!
//! Remote capabilities the pipeline drives. Any plugin must implement these
//! traits to be wired into the services.

use async_trait::async_trait;
use bytes::Bytes;

use crate::models::Session;

/// Source of the current session, if any.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> anyhow::Result<Option<Session>>;
}

/// Per-user profile lookups. Each query is independent of the other.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Whether a "doctor" record exists for this user.
    async fn has_doctor_record(&self, user_id: &str) -> anyhow::Result<bool>;

    /// Display name of the user. Missing profiles are an error, not an empty name.
    async fn display_name(&self, user_id: &str) -> anyhow::Result<String>;
}

/// Binary object storage with publicly addressable objects.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` at `path`, replacing any existing object.
    async fn put_object(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()>;

    /// Public URL of the object at `path`. Always derivable once it exists.
    fn public_url_for(&self, path: &str) -> String;

    /// Removes the object at `path`. Only used to compensate a failed submission.
    async fn delete_object(&self, path: &str) -> anyhow::Result<()>;
}

/// Row-oriented persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Inserts a single record. `record` must be a JSON object keyed by column.
    async fn insert(&self, table: &str, record: serde_json::Value) -> anyhow::Result<()>;

    /// Returns every row of `table` as a JSON object.
    async fn select_all(&self, table: &str) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// Page navigation. Fire-and-forget.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}
