//! # mb-storage-local
//! medboard/crates/mb-plugins/mb-storage-local/src/lib.rs
//! Local filesystem implementation of `ObjectStore`.
//! Objects live at `<root>/<bucket>/<path>` and are served from
//! `<url_prefix>/<bucket>/<path>`.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use mb_config::StorageConfig;
use mb_core::ObjectStore;
use tokio::fs;

pub struct LocalObjectStore {
    /// Root directory for all buckets (e.g., "./data/objects")
    root_path: PathBuf,
    bucket: String,
    /// Public URL prefix (e.g., "/storage/v1/object/public")
    url_prefix: String,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, bucket: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root,
            bucket: bucket.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            config.root_dir.clone(),
            config.bucket.clone(),
            config.public_base_url.clone(),
        )
    }

    /// Maps an object path onto the bucket directory, refusing anything that
    /// could escape it.
    fn file_path(&self, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            anyhow::bail!("invalid object path {path:?}");
        }
        Ok(self.root_path.join(&self.bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Writes the object, replacing whatever was stored at the same path.
    async fn put_object(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()> {
        let target = self.file_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        // Write to a sibling temp file first so readers never see a torn object.
        let staging = target.with_extension("partial");
        fs::write(&staging, &bytes)
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, &target)
            .await
            .with_context(|| format!("moving object into {}", target.display()))?;

        tracing::debug!(%path, content_type, size = bytes.len(), "object stored");
        Ok(())
    }

    fn public_url_for(&self, path: &str) -> String {
        format!("{}/{}/{}", self.url_prefix, self.bucket, path)
    }

    async fn delete_object(&self, path: &str) -> anyhow::Result<()> {
        let target = self.file_path(path)?;
        fs::remove_file(&target)
            .await
            .with_context(|| format!("removing {}", target.display()))?;
        Ok(())
    }
}
