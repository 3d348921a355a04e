//! medboard/crates/mb-core/src/lib.rs
//!
//! Domain models, port definitions and error types shared by every medboard crate.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
