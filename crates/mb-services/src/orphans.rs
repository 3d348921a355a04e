//! # Orphan Ledger
//!
//! Uploaded objects whose post insert failed. Entries are keyed by object
//! path: a later successful submission that reuses the path references the
//! object again and takes it off the ledger.
//!
//! Object paths are deterministic, so a failed resubmission can land on an
//! object that an earlier post still points at. Nothing referenced by a
//! persisted post is ever deleted.

use std::collections::HashSet;

use chrono::Utc;
use dashmap::DashMap;
use mb_core::{ObjectStore, OrphanedAsset, RelationalStore, StoredAsset};

#[derive(Debug, Default)]
pub struct OrphanLedger {
    entries: DashMap<String, OrphanedAsset>,
}

/// Outcome of one [`OrphanLedger::reconcile`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: Vec<String>,
    /// Paths whose delete failed; they stay on the ledger.
    pub failed: Vec<String>,
    /// Paths a persisted post points at. Taken off the ledger, object kept.
    pub referenced: Vec<String>,
}

/// Every `imageLink` currently stored in `posts_table`.
pub async fn referenced_urls(
    posts: &dyn RelationalStore,
    posts_table: &str,
) -> anyhow::Result<HashSet<String>> {
    let rows = posts.select_all(posts_table).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("imageLink").and_then(|v| v.as_str()))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect())
}

impl OrphanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, asset: &StoredAsset, author_id: &str, reason: &str) {
        tracing::warn!(
            path = %asset.path,
            author_id,
            reason,
            "recorded orphaned asset for reconciliation"
        );
        self.entries.insert(
            asset.path.clone(),
            OrphanedAsset {
                path: asset.path.clone(),
                public_url: asset.public_url.clone(),
                author_id: author_id.to_string(),
                reason: reason.to_string(),
                recorded_at: Utc::now(),
            },
        );
    }

    /// Drops the entry for `path`, if any. Called once the object is referenced again.
    pub fn resolve(&self, path: &str) -> Option<OrphanedAsset> {
        self.entries.remove(path).map(|(_, orphan)| orphan)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Snapshot of all entries, oldest first.
    pub fn list(&self) -> Vec<OrphanedAsset> {
        let mut orphans: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        orphans.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.path.cmp(&b.path)));
        orphans
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-effort delete of every recorded object that no post in
    /// `posts_table` references. If the posts cannot be read, nothing is
    /// deleted and every entry stays on the ledger.
    pub async fn reconcile(
        &self,
        objects: &dyn ObjectStore,
        posts: &dyn RelationalStore,
        posts_table: &str,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let referenced = match referenced_urls(posts, posts_table).await {
            Ok(urls) => urls,
            Err(err) => {
                tracing::error!(table = posts_table, error = %err, "cannot read posts, skipping reconcile");
                return report;
            }
        };

        for orphan in self.list() {
            if referenced.contains(&orphan.public_url) {
                tracing::info!(path = %orphan.path, "orphan is referenced by a post, keeping object");
                self.entries.remove(&orphan.path);
                report.referenced.push(orphan.path);
                continue;
            }
            match objects.delete_object(&orphan.path).await {
                Ok(()) => {
                    self.entries.remove(&orphan.path);
                    report.deleted.push(orphan.path);
                }
                Err(err) => {
                    tracing::error!(path = %orphan.path, error = %err, "orphan delete failed");
                    report.failed.push(orphan.path);
                }
            }
        }
        report
    }
}
