//! # mb-ui
//!
//! HTML fragments for the create-post page and the alert banner. Output is
//! escaped by askama; nothing user-supplied is rendered raw.

use askama::Template;
use mb_core::{Alert, Session};
use mb_services::{AccessGate, AlertSnapshot, FormStatus, GateView, PostForm};

pub const NOT_AUTHORIZED_NOTICE: &str = "You are not authorized to create posts. Redirecting...";
pub const CHECKING_NOTICE: &str = "Checking your access...";

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"{% if checking %}<div class="gate"><p>{{ checking_notice }}</p></div>
{% else if !authorized %}<div class="gate"><p>{{ denied_notice }}</p></div>
{% else %}<form class="create-post" method="post" enctype="multipart/form-data">
<h1>Create a Post</h1>
<label for="title">Title *</label>
<input id="title" name="title" type="text" placeholder="Enter a title for your post" value="{{ title }}" required>
<label for="content">Content *</label>
<textarea id="content" name="content" rows="4" placeholder="Write your post content..." required>{{ content }}</textarea>
<label for="location">Location *</label>
<input id="location" name="location" type="text" placeholder="Enter your location" value="{{ location }}" required>
<label for="imageLink">Image (Optional)</label>
<input id="imageLink" name="imageLink" type="file" accept="image/*">
{% match error_message %}{% when Some with (msg) %}<p class="error">{{ msg }}</p>
{% when None %}{% endmatch %}{% match success_message %}{% when Some with (msg) %}<p class="success">{{ msg }}</p>
{% when None %}{% endmatch %}<button type="submit"{% if submitting %} disabled{% endif %}>{% if submitting %}Submitting...{% else %}Create Post{% endif %}</button>
</form>
{% endif %}"#
)]
pub struct CreatePostTemplate<'a> {
    pub checking: bool,
    pub authorized: bool,
    pub checking_notice: &'a str,
    pub denied_notice: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub location: &'a str,
    pub error_message: Option<&'a str>,
    pub success_message: Option<&'a str>,
    pub submitting: bool,
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"{% for alert in alerts %}<div class="alert" data-alert-id="{{ alert.id }}"><strong>{{ alert.title }}</strong> <span>{{ alert.message }}</span></div>
{% endfor %}"#
)]
pub struct AlertBannerTemplate<'a> {
    pub alerts: &'a [Alert],
}

/// Renders whatever the gate currently allows: a notice, or the form.
pub fn render_create_post(gate: &AccessGate, form: &PostForm) -> askama::Result<String> {
    let draft = form.draft();
    let status = form.status();
    let view = gate.view();

    CreatePostTemplate {
        checking: view == GateView::Checking,
        authorized: view == GateView::Form,
        checking_notice: CHECKING_NOTICE,
        denied_notice: NOT_AUTHORIZED_NOTICE,
        title: &draft.title,
        content: &draft.content,
        location: &draft.location,
        error_message: status.error_message(),
        success_message: status.success_message(),
        submitting: form.is_submitting() || status == FormStatus::Submitting,
    }
    .render()
}

pub fn render_alerts(snapshot: &AlertSnapshot) -> askama::Result<String> {
    AlertBannerTemplate {
        alerts: snapshot.alerts(),
    }
    .render()
}

/// Fallback letter for the header avatar: username, then email, then "U".
pub fn avatar_initial(session: Option<&Session>) -> String {
    session
        .and_then(|s| {
            s.username
                .as_deref()
                .filter(|u| !u.is_empty())
                .or_else(|| s.email.as_deref().filter(|e| !e.is_empty()))
        })
        .and_then(|text| text.chars().next())
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "U".to_string())
}
