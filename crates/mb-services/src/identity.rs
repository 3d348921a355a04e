//! # Identity Resolver
//!
//! Turns a session into an [`Identity`]. Lookup failures never propagate:
//! a failed capability check means "not a doctor" and a failed name lookup
//! means an empty display name.

use std::sync::Arc;

use mb_core::{Identity, ProfileStore, Session, SessionProvider};

pub struct IdentityResolver {
    profiles: Arc<dyn ProfileStore>,
}

impl IdentityResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Resolves `session`, or the anonymous placeholder when there is none.
    pub async fn resolve(&self, session: Option<&Session>) -> Identity {
        let Some(session) = session else {
            return Identity::anonymous();
        };
        let user_id = session.user_id.as_str();

        // Independent lookups; neither waits on the other.
        let (capability, name) = tokio::join!(
            self.profiles.has_doctor_record(user_id),
            self.profiles.display_name(user_id),
        );

        let has_doctor_capability = capability.unwrap_or_else(|err| {
            tracing::error!(user_id, error = %err, "doctor lookup failed, treating as non-doctor");
            false
        });
        let display_name = name.unwrap_or_else(|err| {
            tracing::error!(user_id, error = %err, "display name lookup failed");
            String::new()
        });

        Identity {
            id: session.user_id.clone(),
            display_name,
            has_doctor_capability,
        }
    }

    /// Resolves whatever session `sessions` currently holds.
    pub async fn resolve_current(&self, sessions: &dyn SessionProvider) -> Identity {
        match sessions.current_session().await {
            Ok(session) => self.resolve(session.as_ref()).await,
            Err(err) => {
                tracing::error!(error = %err, "session lookup failed, resolving as anonymous");
                Identity::anonymous()
            }
        }
    }
}
