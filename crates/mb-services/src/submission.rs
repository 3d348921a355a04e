//! # Submission Orchestrator
//!
//! Runs one post submission: validate, upload the optional asset, then insert
//! the post record. The two remote writes are strictly sequential because the
//! record carries the asset's public URL.
//!
//! The writes are not transactional. If the upload succeeds and the insert
//! fails, the uploaded object is left without a referencing post. The
//! configured [`OrphanPolicy`] decides what happens to it; the caller only
//! ever sees the persistence error.

use std::sync::Arc;

use mb_config::{StorageConfig, SubmissionConfig, TablesConfig};
use mb_core::{
    DraftPost, Identity, ObjectStore, OrphanPolicy, Post, RelationalStore, Result, StoredAsset,
    SubmitError,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::orphans::{referenced_urls, OrphanLedger, ReconcileReport};
use crate::uploader::AssetUploader;

pub const MISSING_FIELDS: &str = "Title, content, and location are required.";

pub struct SubmissionOrchestrator {
    uploader: AssetUploader,
    store: Arc<dyn RelationalStore>,
    posts_table: String,
    orphan_policy: OrphanPolicy,
    ledger: Arc<OrphanLedger>,
}

impl SubmissionOrchestrator {
    pub fn new(
        uploader: AssetUploader,
        store: Arc<dyn RelationalStore>,
        posts_table: impl Into<String>,
    ) -> Self {
        Self {
            uploader,
            store,
            posts_table: posts_table.into(),
            orphan_policy: OrphanPolicy::default(),
            ledger: Arc::new(OrphanLedger::new()),
        }
    }

    /// Wires the orchestrator from the loaded configuration sections.
    pub fn from_config(
        objects: Arc<dyn ObjectStore>,
        store: Arc<dyn RelationalStore>,
        storage: &StorageConfig,
        tables: &TablesConfig,
        submission: &SubmissionConfig,
    ) -> Self {
        Self::new(
            AssetUploader::from_config(objects, storage),
            store,
            tables.posts.clone(),
        )
        .with_orphan_policy(submission.orphan_policy)
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Shares a ledger with other orchestrators or a reconciliation job.
    pub fn with_ledger(mut self, ledger: Arc<OrphanLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &Arc<OrphanLedger> {
        &self.ledger
    }

    /// Submits `draft` on behalf of `identity`. Every error is terminal for
    /// this attempt; nothing is retried.
    pub async fn submit(&self, identity: &Identity, draft: &DraftPost) -> Result<Post> {
        let span = tracing::info_span!(
            "submit_post",
            attempt_id = %Uuid::now_v7(),
            author_id = %identity.id,
        );
        self.run(identity, draft).instrument(span).await
    }

    async fn run(&self, identity: &Identity, draft: &DraftPost) -> Result<Post> {
        validate(draft)?;
        // The access gate redirects these visitors before the form is shown;
        // this only stops callers that bypass the gate.
        if !identity.has_doctor_capability {
            tracing::warn!("submission attempted without doctor capability");
            return Err(SubmitError::Authorization);
        }

        // Step 1: upload. A failure here aborts before any insert.
        let asset = match &draft.selected_asset {
            Some(file) => Some(self.uploader.upload(&identity.id, file).await?),
            None => None,
        };

        let post = Post {
            author_id: identity.id.clone(),
            author_display_name: identity.display_name.clone(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            location: draft.location.clone(),
            image_url: asset
                .as_ref()
                .map(|a| a.public_url.clone())
                .unwrap_or_default(),
        };

        // Step 2: insert.
        let record =
            serde_json::to_value(&post).map_err(|e| SubmitError::Persistence(e.to_string()))?;
        if let Err(err) = self.store.insert(&self.posts_table, record).await {
            let reason = err.to_string();
            tracing::error!(table = %self.posts_table, error = %reason, "post insert failed");
            if let Some(asset) = &asset {
                self.handle_orphan(identity, asset, &reason).await;
            }
            return Err(SubmitError::Persistence(reason));
        }

        if let Some(asset) = &asset {
            // The object is referenced now, even if an earlier attempt stranded it.
            self.ledger.resolve(&asset.path);
        }
        tracing::info!(has_image = asset.is_some(), "post created");
        Ok(post)
    }

    /// Takes the orphan off the table, either onto the ledger or out of the
    /// store. An object that a persisted post already points at is left alone.
    async fn handle_orphan(&self, identity: &Identity, asset: &StoredAsset, reason: &str) {
        match referenced_urls(self.store.as_ref(), &self.posts_table).await {
            Ok(urls) if urls.contains(&asset.public_url) => {
                tracing::info!(path = %asset.path, "asset still referenced by an earlier post, keeping it");
                self.ledger.resolve(&asset.path);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(path = %asset.path, error = %err, "cannot check asset references, recording orphan");
                self.ledger.record(asset, &identity.id, reason);
                return;
            }
        }

        match self.orphan_policy {
            OrphanPolicy::Record => self.ledger.record(asset, &identity.id, reason),
            OrphanPolicy::Delete => match self.uploader.discard(asset).await {
                Ok(()) => {
                    tracing::info!(path = %asset.path, "deleted asset of failed submission");
                    self.ledger.resolve(&asset.path);
                }
                Err(err) => {
                    tracing::error!(path = %asset.path, error = %err, "compensating delete failed");
                    self.ledger.record(asset, &identity.id, reason);
                }
            },
        }
    }

    /// Runs [`OrphanLedger::reconcile`] against this orchestrator's stores.
    pub async fn reconcile_orphans(&self) -> ReconcileReport {
        self.ledger
            .reconcile(self.uploader.object_store(), self.store.as_ref(), &self.posts_table)
            .await
    }
}

/// Title, content and location must be non-empty. Whitespace counts as content.
pub fn validate(draft: &DraftPost) -> Result<()> {
    let blank = [&draft.title, &draft.content, &draft.location]
        .iter()
        .any(|field| field.is_empty());
    if blank {
        return Err(SubmitError::Validation(MISSING_FIELDS.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::{AssetFile, MockObjectStore, MockRelationalStore};
    use tokio_test::{assert_err, assert_ok};

    fn doctor() -> Identity {
        Identity {
            id: "u1".into(),
            display_name: "Dr. Grey".into(),
            has_doctor_capability: true,
        }
    }

    fn draft() -> DraftPost {
        DraftPost {
            title: "T".into(),
            content: "C".into(),
            location: "L".into(),
            selected_asset: None,
        }
    }

    fn draft_with_image() -> DraftPost {
        DraftPost {
            selected_asset: Some(AssetFile::new("scan.png", vec![1, 2, 3])),
            ..draft()
        }
    }

    fn uploading_store() -> MockObjectStore {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().times(1).returning(|_, _, _| Ok(()));
        objects
            .expect_public_url_for()
            .returning(|path| format!("https://cdn.test/images/{path}"));
        objects
    }

    fn orchestrator(objects: MockObjectStore, rows: MockRelationalStore) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(
            AssetUploader::new(Arc::new(objects), "post"),
            Arc::new(rows),
            "posts",
        )
    }

    #[test]
    fn blank_fields_fail_validation() {
        assert_ok!(validate(&draft()));
        for broken in [
            DraftPost { title: String::new(), ..draft() },
            DraftPost { content: String::new(), ..draft() },
            DraftPost { location: String::new(), ..draft() },
        ] {
            assert_eq!(
                validate(&broken),
                Err(SubmitError::Validation(MISSING_FIELDS.into()))
            );
        }
    }

    #[test]
    fn whitespace_only_fields_are_present() {
        assert_ok!(validate(&DraftPost {
            title: "   ".into(),
            content: "\n".into(),
            ..draft()
        }));
    }

    fn no_posts(rows: &mut MockRelationalStore) {
        rows.expect_select_all().returning(|_| Ok(Vec::new()));
    }

    #[tokio::test]
    async fn text_only_post_never_touches_object_store() {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().never();
        let mut rows = MockRelationalStore::new();
        rows.expect_insert()
            .withf(|table, record| {
                table == "posts" && record["userId"] == "u1" && record["imageLink"] == ""
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let post = orchestrator(objects, rows)
            .submit(&doctor(), &draft())
            .await
            .unwrap();

        assert_eq!(post.author_id, "u1");
        assert_eq!(post.author_display_name, "Dr. Grey");
        assert_eq!((post.title.as_str(), post.content.as_str(), post.location.as_str()), ("T", "C", "L"));
        assert!(post.image_url.is_empty());
    }

    #[tokio::test]
    async fn image_url_is_recorded_on_the_post() {
        let mut rows = MockRelationalStore::new();
        rows.expect_insert()
            .withf(|_, record| record["imageLink"] == "https://cdn.test/images/post/u1_scan_png")
            .times(1)
            .returning(|_, _| Ok(()));

        let post = orchestrator(uploading_store(), rows)
            .submit(&doctor(), &draft_with_image())
            .await
            .unwrap();
        assert!(post.image_url.contains("u1_scan_png"));
    }

    #[tokio::test]
    async fn validation_failure_makes_no_remote_calls() {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().never();
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().never();

        let broken = DraftPost {
            location: String::new(),
            ..draft_with_image()
        };
        let result = orchestrator(objects, rows).submit(&doctor(), &broken).await;
        assert!(matches!(result, Err(SubmitError::Validation(_))));
    }

    #[tokio::test]
    async fn identity_without_capability_is_refused_before_upload() {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().never();
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().never();

        let visitor = Identity {
            has_doctor_capability: false,
            ..doctor()
        };
        let result = orchestrator(objects, rows)
            .submit(&visitor, &draft_with_image())
            .await;
        assert_eq!(result, Err(SubmitError::Authorization));
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_insert() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put_object()
            .returning(|_, _, _| Err(anyhow::anyhow!("The resource already exists")));
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().never();

        let result = orchestrator(objects, rows)
            .submit(&doctor(), &draft_with_image())
            .await;
        assert_eq!(
            result,
            Err(SubmitError::Upload("The resource already exists".into()))
        );
    }

    #[tokio::test]
    async fn insert_failure_after_upload_records_orphan() {
        let mut rows = MockRelationalStore::new();
        no_posts(&mut rows);
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("permission denied for table posts")));

        let orchestrator = orchestrator(uploading_store(), rows);
        let result = orchestrator.submit(&doctor(), &draft_with_image()).await;

        assert_eq!(
            result,
            Err(SubmitError::Persistence("permission denied for table posts".into()))
        );
        let orphans = orchestrator.ledger().list();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].path, "post/u1_scan_png");
        assert_eq!(orphans[0].author_id, "u1");
    }

    #[tokio::test]
    async fn insert_failure_without_upload_leaves_no_orphan() {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().never();
        let mut rows = MockRelationalStore::new();
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let orchestrator = orchestrator(objects, rows);
        assert_err!(orchestrator.submit(&doctor(), &draft()).await);
        assert!(orchestrator.ledger().is_empty());
    }

    #[tokio::test]
    async fn delete_policy_compensates_the_upload() {
        let mut objects = uploading_store();
        objects
            .expect_delete_object()
            .withf(|path| path == "post/u1_scan_png")
            .times(1)
            .returning(|_| Ok(()));
        let mut rows = MockRelationalStore::new();
        no_posts(&mut rows);
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("insert rejected")));

        let orchestrator = orchestrator(objects, rows).with_orphan_policy(OrphanPolicy::Delete);
        let result = orchestrator.submit(&doctor(), &draft_with_image()).await;

        assert!(matches!(result, Err(SubmitError::Persistence(_))));
        assert!(orchestrator.ledger().is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_falls_back_to_ledger() {
        let mut objects = uploading_store();
        objects
            .expect_delete_object()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        let mut rows = MockRelationalStore::new();
        no_posts(&mut rows);
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("insert rejected")));

        let orchestrator = orchestrator(objects, rows).with_orphan_policy(OrphanPolicy::Delete);
        let _ = orchestrator.submit(&doctor(), &draft_with_image()).await;

        assert!(orchestrator.ledger().contains("post/u1_scan_png"));
    }

    #[tokio::test]
    async fn successful_reupload_clears_stale_orphan_entry() {
        let mut objects = MockObjectStore::new();
        objects.expect_put_object().times(2).returning(|_, _, _| Ok(()));
        objects
            .expect_public_url_for()
            .returning(|path| format!("https://cdn.test/images/{path}"));
        let mut rows = MockRelationalStore::new();
        no_posts(&mut rows);
        let mut calls = 0;
        rows.expect_insert().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(anyhow::anyhow!("insert rejected"))
            } else {
                Ok(())
            }
        });

        let orchestrator = orchestrator(objects, rows);
        assert_err!(orchestrator.submit(&doctor(), &draft_with_image()).await);
        assert_eq!(orchestrator.ledger().len(), 1);

        assert_ok!(orchestrator.submit(&doctor(), &draft_with_image()).await);
        assert!(orchestrator.ledger().is_empty());
    }

    #[tokio::test]
    async fn failed_resubmission_keeps_object_an_earlier_post_references() {
        for policy in [OrphanPolicy::Delete, OrphanPolicy::Record] {
            let mut objects = uploading_store();
            objects.expect_delete_object().never();
            let mut rows = MockRelationalStore::new();
            rows.expect_insert()
                .returning(|_, _| Err(anyhow::anyhow!("insert rejected")));
            rows.expect_select_all().returning(|_| {
                Ok(vec![serde_json::json!({
                    "userId": "u1",
                    "imageLink": "https://cdn.test/images/post/u1_scan_png",
                })])
            });

            let orchestrator = orchestrator(objects, rows).with_orphan_policy(policy);
            let result = orchestrator.submit(&doctor(), &draft_with_image()).await;

            assert!(matches!(result, Err(SubmitError::Persistence(_))));
            assert!(orchestrator.ledger().is_empty(), "{policy:?}");
        }
    }

    #[tokio::test]
    async fn unreadable_posts_fall_back_to_ledger_even_with_delete_policy() {
        let mut objects = uploading_store();
        objects.expect_delete_object().never();
        let mut rows = MockRelationalStore::new();
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("insert rejected")));
        rows.expect_select_all()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let orchestrator = orchestrator(objects, rows).with_orphan_policy(OrphanPolicy::Delete);
        let _ = orchestrator.submit(&doctor(), &draft_with_image()).await;
        assert!(orchestrator.ledger().contains("post/u1_scan_png"));
    }
}
