//! Record identifiers and sharded-path utilities.
//!
//! Meditache stores every record under a sharded directory derived from its identifier, so the
//! identifier needs one canonical spelling: **32 lowercase hexadecimal characters** (no
//! hyphens), exactly what `Uuid::new_v4().simple().to_string()` produces.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, a record lives under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `meditache_data/interventions/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps any single directory from growing without bound.

mod shardable;

pub use shardable::{ShardableUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
