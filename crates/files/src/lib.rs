//! Meditache file storage
//!
//! Binary uploads (scans, photos, PDF reports) are kept out of the record store. This crate
//! writes them to a content-addressed tree and hands back an opaque reference string; records
//! only ever hold those strings.
//!
//! ## Storage Layout
//!
//! ```text
//! <uploads_dir>/
//! └── <collection>/            # e.g. "interventions"
//!     └── sha256/
//!         └── ab/
//!             └── 3f/
//!                 └── ab3f9e….png
//! ```
//!
//! The matching reference is `/uploads/<collection>/sha256/ab/3f/ab3f9e….png`, which is also the
//! URL under which the REST server publishes the uploads directory.
//!
//! ## Example Usage
//!
//! ```no_run
//! use meditache_files::FilesService;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("uploads"), "interventions")?;
//! let stored = service.store("scan.png", b"\x89PNG...")?;
//! println!("{}", stored.reference);
//! # Ok(())
//! # }
//! ```

mod files;

pub use files::{FilesService, Sha256Hash, StoredFile};

/// URL prefix under which stored files are published.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Directory name separating hash algorithms inside a collection.
pub const HASH_DIR_NAME: &str = "sha256";

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Collection name is not a single safe path segment
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    /// Uploaded content was empty
    #[error("File is empty: {0}")]
    EmptyFile(String),

    /// Hash text is not a SHA-256 hex digest
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
