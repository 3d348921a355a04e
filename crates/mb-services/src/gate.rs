//! # Access Gate
//!
//! Guards the create-post view. Until the identity is resolved nothing
//! privileged is shown. Once resolved without the doctor capability, the gate
//! shows a notice and schedules a single redirect after a grace delay. The
//! scheduled redirect is aborted if the capability turns true or the gate is
//! torn down.

use std::sync::Arc;
use std::time::Duration;

use mb_config::GateConfig;
use mb_core::{Identity, Navigator};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Resolved { authorized: bool },
}

/// What the privileged view may show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView {
    Checking,
    NotAuthorized,
    Form,
}

pub struct AccessGate {
    state: GateState,
    delay: Duration,
    redirect_to: String,
    navigator: Arc<dyn Navigator>,
    redirect: Option<JoinHandle<()>>,
}

impl AccessGate {
    pub fn new(navigator: Arc<dyn Navigator>, config: &GateConfig) -> Self {
        Self {
            state: GateState::Pending,
            delay: config.redirect_delay(),
            redirect_to: config.redirect_to.clone(),
            navigator,
            redirect: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn view(&self) -> GateView {
        match self.state {
            GateState::Pending => GateView::Checking,
            GateState::Resolved { authorized: true } => GateView::Form,
            GateState::Resolved { authorized: false } => GateView::NotAuthorized,
        }
    }

    /// Applies a freshly resolved identity.
    ///
    /// Must be called from within a tokio runtime: denying access spawns the
    /// redirect task.
    pub fn resolve(&mut self, identity: &Identity) {
        let authorized = identity.has_doctor_capability;
        self.state = GateState::Resolved { authorized };

        if authorized {
            self.cancel_redirect();
        } else if self.redirect.is_none() {
            self.schedule_redirect();
        }
    }

    /// True while a redirect is waiting to fire.
    pub fn redirect_pending(&self) -> bool {
        self.redirect.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Ends the gate's lifecycle. A pending redirect never fires.
    pub fn teardown(self) {
        drop(self);
    }

    fn schedule_redirect(&mut self) {
        let deadline = Instant::now() + self.delay;
        let navigator = Arc::clone(&self.navigator);
        let target = self.redirect_to.clone();

        tracing::debug!(delay_ms = self.delay.as_millis() as u64, "scheduling redirect");
        self.redirect = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            tracing::info!(redirect_to = %target, "redirecting unauthorized visitor");
            navigator.redirect(&target);
        }));
    }

    fn cancel_redirect(&mut self) {
        if let Some(task) = self.redirect.take() {
            task.abort();
        }
    }
}

impl Drop for AccessGate {
    fn drop(&mut self) {
        self.cancel_redirect();
    }
}
