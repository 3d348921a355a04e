//! # Errors
//!
//! Typed failures of the submission pipeline. Port adapters report
//! `anyhow::Error`; the services map those into the variants below.

use thiserror::Error;

/// Why a single submission attempt ended without a post.
///
/// Every variant is terminal for the attempt. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A required field was missing. Raised before any remote call.
    #[error("{0}")]
    Validation(String),

    /// The identity does not hold the doctor capability.
    #[error("you are not authorized to create posts")]
    Authorization,

    /// The object store rejected the asset write.
    #[error("{0}")]
    Upload(String),

    /// The relational store rejected the post insert.
    #[error("{0}")]
    Persistence(String),

    /// The form already has a submission in flight.
    #[error("a submission is already in progress")]
    InFlight,
}

impl From<UploadError> for SubmitError {
    fn from(err: UploadError) -> Self {
        SubmitError::Upload(err.to_string())
    }
}

/// Failure of the asset uploader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The object store refused the write (quota, invalid path, network).
    #[error("{0}")]
    Rejected(String),
}

/// A specialized Result type for the submission pipeline.
pub type Result<T> = std::result::Result<T, SubmitError>;
