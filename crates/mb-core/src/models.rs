//! # Domain Models
//!
//! These structs represent the core entities of medboard: who is acting,
//! what they are drafting, and what ends up persisted.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the session provider knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            username: None,
        }
    }
}

/// The acting user, resolved once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id. Empty for the anonymous placeholder.
    pub id: String,
    pub display_name: String,
    pub has_doctor_capability: bool,
}

impl Identity {
    /// Non-privileged placeholder used when there is no session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }
}

/// A locally selected file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Filename as chosen by the user, before sanitizing.
    pub original_name: String,
    pub bytes: Bytes,
}

impl AssetFile {
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// User-entered, not yet persisted submission state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftPost {
    pub title: String,
    pub content: String,
    pub location: String,
    pub selected_asset: Option<AssetFile>,
}

impl DraftPost {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An object written to the object store during one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    /// Deterministic destination, e.g. `post/u1_cat_png`.
    pub path: String,
    pub public_url: String,
}

/// A persisted post. Field names on the wire match the `posts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "userId")]
    pub author_id: String,
    #[serde(rename = "userName")]
    pub author_display_name: String,
    pub title: String,
    pub content: String,
    pub location: String,
    /// Public URL of the attached image, or empty when none was uploaded.
    #[serde(rename = "imageLink")]
    pub image_url: String,
}

/// A broadcast notice shown to every visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub title: String,
    pub message: String,
}

/// What to do with an uploaded object when the post insert that should
/// reference it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Keep the object and record it for a later reconciliation pass.
    #[default]
    Record,
    /// Try to delete the object right away. Falls back to `Record` if the
    /// delete fails too.
    Delete,
}

/// An uploaded object left without a referencing post after the insert failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedAsset {
    pub path: String,
    pub public_url: String,
    pub author_id: String,
    /// The persistence failure that stranded the object.
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}
