//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the stores. Nothing in
//! the request path reads environment variables, which keeps behaviour consistent across threads
//! and test harnesses.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_UPLOADS_DIR};
use crate::{MeditacheError, MeditacheResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    data_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::InvalidConfig`] if either path is empty or the two paths are the
    /// same directory (uploads are served publicly, records are not).
    pub fn new(data_dir: PathBuf, uploads_dir: PathBuf) -> MeditacheResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(MeditacheError::InvalidConfig(
                "data directory cannot be empty".into(),
            ));
        }
        if uploads_dir.as_os_str().is_empty() {
            return Err(MeditacheError::InvalidConfig(
                "uploads directory cannot be empty".into(),
            ));
        }
        if data_dir == uploads_dir {
            return Err(MeditacheError::InvalidConfig(
                "data and uploads directories must differ".into(),
            ));
        }

        Ok(Self {
            data_dir,
            uploads_dir,
        })
    }

    /// Build a configuration from optional raw values (typically environment variables).
    ///
    /// Missing or blank values fall back to [`DEFAULT_DATA_DIR`] and [`DEFAULT_UPLOADS_DIR`].
    pub fn from_env_values(
        data_dir: Option<String>,
        uploads_dir: Option<String>,
    ) -> MeditacheResult<Self> {
        fn or_default(value: Option<String>, default: &str) -> PathBuf {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        }

        Self::new(
            or_default(data_dir, DEFAULT_DATA_DIR),
            or_default(uploads_dir, DEFAULT_UPLOADS_DIR),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Creates the data and uploads directories if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::InvalidConfig`] if a directory cannot be created.
    pub fn ensure_directories(&self) -> MeditacheResult<()> {
        for dir in [&self.data_dir, &self.uploads_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                MeditacheError::InvalidConfig(format!(
                    "cannot create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
