//! # Asset Uploader
//!
//! Writes a selected file to the object store under a path derived only from
//! the uploader's id and the original filename. The same user uploading the
//! same filename twice lands on the same path and replaces the earlier
//! object; there is at most one object per (user, filename) pair.

use std::sync::Arc;

use mb_config::StorageConfig;
use mb_core::{AssetFile, ObjectStore, StoredAsset, UploadError};

pub struct AssetUploader {
    store: Arc<dyn ObjectStore>,
    /// Folder inside the bucket, e.g. "post".
    folder: String,
}

impl AssetUploader {
    pub fn new(store: Arc<dyn ObjectStore>, folder: impl Into<String>) -> Self {
        Self {
            store,
            folder: folder.into(),
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self::new(store, config.folder.clone())
    }

    /// Destination path for `original_name` uploaded by `identity_id`.
    pub fn path_for(&self, identity_id: &str, original_name: &str) -> String {
        asset_path(&self.folder, identity_id, original_name)
    }

    /// Uploads `file` and resolves its public URL. Not retried on failure.
    pub async fn upload(
        &self,
        identity_id: &str,
        file: &AssetFile,
    ) -> Result<StoredAsset, UploadError> {
        let path = self.path_for(identity_id, &file.original_name);
        let content_type = mime_guess::from_path(&file.original_name).first_or_octet_stream();

        self.store
            .put_object(&path, file.bytes.clone(), content_type.essence_str())
            .await
            .map_err(|err| {
                tracing::error!(%path, error = %err, "asset upload rejected");
                UploadError::Rejected(err.to_string())
            })?;

        let public_url = self.store.public_url_for(&path);
        tracing::debug!(%path, %public_url, size = file.bytes.len(), "asset uploaded");
        Ok(StoredAsset { path, public_url })
    }

    pub(crate) fn object_store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Deletes a previously uploaded asset.
    pub async fn discard(&self, asset: &StoredAsset) -> anyhow::Result<()> {
        self.store.delete_object(&asset.path).await
    }
}

/// `folder/` + sanitize(`identity_id` + "_" + `original_name`).
pub fn asset_path(folder: &str, identity_id: &str, original_name: &str) -> String {
    format!("{folder}/{}", sanitize(&format!("{identity_id}_{original_name}")))
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`, one per UTF-16
/// code unit, so characters outside the BMP become `__`. Existing stored
/// objects were named that way.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.extend(std::iter::repeat('_').take(c.len_utf16()));
        }
    }
    out
}
