//! # Post Form
//!
//! One form instance: owns the draft, the status line, and the submit
//! control. While a submission is in flight the control is disabled and
//! further submits are refused without touching any store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mb_config::SubmissionConfig;
use mb_core::{AssetFile, DraftPost, Identity, Navigator, Post, SubmitError};

use crate::submission::SubmissionOrchestrator;

pub const SUCCESS_MESSAGE: &str = "Your post has been created successfully!";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormStatus {
    #[default]
    Idle,
    Submitting,
    Succeeded(String),
    Failed(String),
}

impl FormStatus {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            FormStatus::Failed(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    pub fn success_message(&self) -> Option<&str> {
        match self {
            FormStatus::Succeeded(msg) => Some(msg.as_str()),
            _ => None,
        }
    }
}

pub struct PostForm {
    orchestrator: Arc<SubmissionOrchestrator>,
    navigator: Arc<dyn Navigator>,
    success_redirect: String,
    draft: Mutex<DraftPost>,
    status: Mutex<FormStatus>,
    in_flight: AtomicBool,
}

/// Re-enables the submit control when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PostForm {
    pub fn new(
        orchestrator: Arc<SubmissionOrchestrator>,
        navigator: Arc<dyn Navigator>,
        config: &SubmissionConfig,
    ) -> Self {
        Self {
            orchestrator,
            navigator,
            success_redirect: config.success_redirect.clone(),
            draft: Mutex::new(DraftPost::default()),
            status: Mutex::new(FormStatus::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        lock(&self.draft).title = title.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        lock(&self.draft).content = content.into();
    }

    pub fn set_location(&self, location: impl Into<String>) {
        lock(&self.draft).location = location.into();
    }

    pub fn select_asset(&self, file: AssetFile) {
        lock(&self.draft).selected_asset = Some(file);
    }

    pub fn clear_asset(&self) {
        lock(&self.draft).selected_asset = None;
    }

    pub fn draft(&self) -> DraftPost {
        lock(&self.draft).clone()
    }

    pub fn status(&self) -> FormStatus {
        lock(&self.status).clone()
    }

    /// Whether the submit control is currently disabled.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submits the current draft. On success the draft is cleared and the
    /// visitor is sent to the post list; on failure the draft is kept as-is.
    pub async fn submit(&self, identity: &Identity) -> Result<Post, SubmitError> {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("submit ignored, already in flight");
            return Err(SubmitError::InFlight);
        };
        *lock(&self.status) = FormStatus::Submitting;

        let draft = self.draft();
        match self.orchestrator.submit(identity, &draft).await {
            Ok(post) => {
                self.clear_submitted(&draft);
                *lock(&self.status) = FormStatus::Succeeded(SUCCESS_MESSAGE.to_string());
                self.navigator.redirect(&self.success_redirect);
                Ok(post)
            }
            Err(SubmitError::Authorization) => {
                // The access gate owns this outcome and redirects; no form message.
                tracing::warn!("submit refused for identity without doctor capability");
                *lock(&self.status) = FormStatus::Idle;
                Err(SubmitError::Authorization)
            }
            Err(err) => {
                *lock(&self.status) = FormStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Clears the fields that went into `submitted`. Edits made while the
    /// submission was in flight are kept.
    fn clear_submitted(&self, submitted: &DraftPost) {
        let mut draft = lock(&self.draft);
        if draft.title == submitted.title {
            draft.title.clear();
        }
        if draft.content == submitted.content {
            draft.content.clear();
        }
        if draft.location == submitted.location {
            draft.location.clear();
        }
        if draft.selected_asset == submitted.selected_asset {
            draft.selected_asset = None;
        }
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::MISSING_FIELDS;
    use crate::uploader::AssetUploader;
    use mb_core::{MockNavigator, MockObjectStore, MockRelationalStore};

    fn doctor() -> Identity {
        Identity {
            id: "u1".into(),
            display_name: "Dr. Grey".into(),
            has_doctor_capability: true,
        }
    }

    fn form(rows: MockRelationalStore, navigator: MockNavigator) -> PostForm {
        let orchestrator = SubmissionOrchestrator::new(
            AssetUploader::new(Arc::new(MockObjectStore::new()), "post"),
            Arc::new(rows),
            "posts",
        );
        PostForm::new(
            Arc::new(orchestrator),
            Arc::new(navigator),
            &SubmissionConfig::default(),
        )
    }

    fn fill(form: &PostForm) {
        form.set_title("T");
        form.set_content("C");
        form.set_location("L");
    }

    #[tokio::test]
    async fn success_clears_draft_and_redirects_to_post_list() {
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().times(1).returning(|_, _| Ok(()));
        let mut navigator = MockNavigator::new();
        navigator
            .expect_redirect()
            .withf(|target| target == "/doctors/all-post")
            .times(1)
            .return_const(());

        let form = form(rows, navigator);
        fill(&form);
        let post = form.submit(&doctor()).await.unwrap();

        assert_eq!(post.title, "T");
        assert!(form.draft().is_empty());
        assert_eq!(form.status().success_message(), Some(SUCCESS_MESSAGE));
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn failure_keeps_draft_and_shows_message() {
        let mut rows = MockRelationalStore::new();
        rows.expect_insert()
            .returning(|_, _| Err(anyhow::anyhow!("duplicate key value")));
        let mut navigator = MockNavigator::new();
        navigator.expect_redirect().never();

        let form = form(rows, navigator);
        fill(&form);
        let before = form.draft();
        let err = form.submit(&doctor()).await.unwrap_err();

        assert_eq!(err, SubmitError::Persistence("duplicate key value".into()));
        assert_eq!(form.draft(), before);
        assert_eq!(form.status().error_message(), Some("duplicate key value"));
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn validation_message_is_shown_verbatim() {
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().never();
        let form = form(rows, MockNavigator::new());
        form.set_title("only a title");

        let _ = form.submit(&doctor()).await;
        assert_eq!(form.status(), FormStatus::Failed(MISSING_FIELDS.to_string()));
        assert_eq!(form.draft().title, "only a title");
    }

    #[tokio::test]
    async fn retry_after_failure_succeeds_without_reentering_data() {
        let mut rows = MockRelationalStore::new();
        let mut attempts = 0;
        rows.expect_insert().times(2).returning(move |_, _| {
            attempts += 1;
            if attempts == 1 {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(())
            }
        });
        let mut navigator = MockNavigator::new();
        navigator.expect_redirect().times(1).return_const(());

        let form = form(rows, navigator);
        fill(&form);
        assert!(form.submit(&doctor()).await.is_err());
        assert!(form.submit(&doctor()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_capability_leaves_no_form_message() {
        let mut rows = MockRelationalStore::new();
        rows.expect_insert().never();
        let mut navigator = MockNavigator::new();
        navigator.expect_redirect().never();

        let form = form(rows, navigator);
        fill(&form);
        let visitor = Identity {
            has_doctor_capability: false,
            ..doctor()
        };

        assert_eq!(form.submit(&visitor).await, Err(SubmitError::Authorization));
        assert_eq!(form.status(), FormStatus::Idle);
        assert_eq!(form.status().error_message(), None);
        assert_eq!(form.draft().title, "T");
    }

    #[test]
    fn second_begin_is_refused_until_guard_drops() {
        let form = form(MockRelationalStore::new(), MockNavigator::new());

        let guard = form.try_begin();
        assert!(guard.is_some());
        assert!(form.is_submitting());
        assert!(form.try_begin().is_none());

        drop(guard);
        assert!(!form.is_submitting());
        assert!(form.try_begin().is_some());
    }

    #[test]
    fn asset_selection_can_be_cleared() {
        let form = form(MockRelationalStore::new(), MockNavigator::new());
        form.select_asset(AssetFile::new("a.png", vec![1]));
        assert!(form.draft().selected_asset.is_some());
        form.clear_asset();
        assert!(form.draft().selected_asset.is_none());
    }
}
