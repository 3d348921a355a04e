//! # mb-services
//!
//! The submission pipeline and its neighbours, written against the ports in
//! `mb-core`:
//!
//! - [`IdentityResolver`]: session to identity, fail-closed on capability.
//! - [`AccessGate`]: blocks the form and schedules the redirect.
//! - [`AssetUploader`]: deterministic object paths.
//! - [`SubmissionOrchestrator`]: upload then insert, with orphan handling.
//! - [`PostForm`]: draft ownership and the single in-flight submission.
//! - [`AnnouncementFeed`]: fail-soft alert listing.

pub mod alerts;
pub mod form;
pub mod gate;
pub mod identity;
pub mod orphans;
pub mod submission;
pub mod uploader;

pub use alerts::{AlertSnapshot, AnnouncementFeed};
pub use form::{FormStatus, PostForm, SUCCESS_MESSAGE};
pub use gate::{AccessGate, GateState, GateView};
pub use identity::IdentityResolver;
pub use orphans::{OrphanLedger, ReconcileReport};
pub use submission::{SubmissionOrchestrator, MISSING_FIELDS};
pub use uploader::{asset_path, sanitize, AssetUploader};
