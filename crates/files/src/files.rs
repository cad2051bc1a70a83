//! Content-addressed upload storage.
//!
//! [`FilesService`] is bound to one collection (a directory under the uploads root, such as
//! `interventions`) and stores byte buffers under their SHA-256 digest:
//!
//! - **Deduplication**: identical bytes are stored once and yield the same reference
//! - **Immutability**: a stored file is never rewritten
//! - **Deterministic paths**: the same content always produces the same reference
//!
//! The service never looks inside a file beyond best-effort media type sniffing.

use crate::{FilesError, HASH_DIR_NAME, UPLOADS_URL_PREFIX};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use meditache_types::NonEmptyText;

/// Longest filename extension carried over from an upload.
const MAX_EXTENSION_LEN: usize = 10;

/// Lowercase hexadecimal SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Computes the digest of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Validates an existing digest string.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidHash`] unless `input` is 64 lowercase hex characters.
    pub fn parse(input: &str) -> Result<Self, FilesError> {
        let valid = input.len() == 64
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(FilesError::InvalidHash(input.to_string()));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sha256Hash {
    type Error = FilesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sha256Hash> for String {
    fn from(value: Sha256Hash) -> Self {
        value.0
    }
}

/// Result of storing one upload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Hexadecimal digest of the file content
    pub hash: Sha256Hash,

    /// Opaque reference handed to records, e.g. `/uploads/interventions/sha256/ab/3f/ab3f….png`
    pub reference: String,

    /// Path relative to the uploads root
    pub relative_path: String,

    pub size_bytes: u64,

    /// Detected media type (MIME type), if available.
    ///
    /// Best-effort only; never authoritative.
    pub media_type: Option<String>,

    /// Filename as supplied by the uploader
    pub original_filename: String,

    pub stored_at: DateTime<Utc>,
}

/// Stores uploads for a single collection under an uploads root.
#[derive(Debug, Clone)]
pub struct FilesService {
    /// Canonicalised uploads root
    root_directory: PathBuf,

    /// Collection directory name, a single safe path segment
    collection: NonEmptyText,
}

impl FilesService {
    /// Creates a service storing into `<root_directory>/<collection>/`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the root directory does not exist, is not a directory, or cannot be canonicalised
    /// - `collection` is blank or contains anything other than `a-z`, `0-9`, `-` and `_`
    pub fn new(root_directory: &Path, collection: &str) -> Result<Self, FilesError> {
        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let collection = NonEmptyText::new(collection)
            .map_err(|_| FilesError::InvalidCollection(collection.to_string()))?;
        let safe = collection
            .as_str()
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'));
        if !safe {
            return Err(FilesError::InvalidCollection(collection.into_inner()));
        }

        Ok(Self {
            root_directory,
            collection,
        })
    }

    /// Stores `bytes` and returns the reference under which they can be fetched.
    ///
    /// Storing the same bytes twice is not an error: the second call finds the existing file,
    /// leaves it untouched and returns the same reference.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `bytes` is empty
    /// - the storage directory cannot be created or the file cannot be written (I/O)
    pub fn store(&self, original_filename: &str, bytes: &[u8]) -> Result<StoredFile, FilesError> {
        if bytes.is_empty() {
            return Err(FilesError::EmptyFile(original_filename.to_string()));
        }

        let hash = Sha256Hash::digest(bytes);
        let detected = infer::get(bytes);
        let extension = extension_from_filename(original_filename)
            .or_else(|| detected.map(|kind| kind.extension().to_string()));

        let relative_path = self.compute_relative_path(&hash, extension.as_deref());
        let storage_path = self.root_directory.join(&relative_path);

        if storage_path.exists() {
            tracing::debug!("upload already stored: {}", relative_path);
        } else {
            write_new_file(&storage_path, bytes)?;
            tracing::info!("stored upload {} ({} bytes)", relative_path, bytes.len());
        }

        Ok(StoredFile {
            reference: format!("{}/{}", UPLOADS_URL_PREFIX, relative_path),
            hash,
            relative_path,
            size_bytes: bytes.len() as u64,
            media_type: detected.map(|kind| kind.mime_type().to_string()),
            original_filename: original_filename.to_string(),
            stored_at: Utc::now(),
        })
    }

    /// Reads a file from disk and stores it, using its file name as the original filename.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the source cannot be read or [`FilesService::store`] fails.
    pub fn add(&self, source_path: &Path) -> Result<StoredFile, FilesError> {
        let bytes = fs::read(source_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read source file {}: {}",
                    source_path.display(),
                    e
                ),
            ))
        })?;

        let original_filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");

        self.store(original_filename, &bytes)
    }

    /// Returns the canonicalised uploads root.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Returns the absolute directory holding this collection's files.
    #[must_use]
    pub fn collection_directory(&self) -> PathBuf {
        self.root_directory.join(self.collection.as_str())
    }

    /// Relative path in the format `<collection>/sha256/<s1>/<s2>/<hash>[.<ext>]`.
    fn compute_relative_path(&self, hash: &Sha256Hash, extension: Option<&str>) -> String {
        let hex = hash.as_str();
        let filename = match extension {
            Some(ext) => format!("{}.{}", hex, ext),
            None => hex.to_string(),
        };
        format!(
            "{}/{}/{}/{}/{}",
            self.collection,
            HASH_DIR_NAME,
            &hex[0..2],
            &hex[2..4],
            filename
        )
    }
}

/// Lowercased extension of `filename` when it is short and purely alphanumeric.
fn extension_from_filename(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    usable.then(|| ext.to_ascii_lowercase())
}

/// Writes via a sibling temp file and a rename so readers never see a partial file.
fn write_new_file(storage_path: &Path, bytes: &[u8]) -> Result<(), FilesError> {
    if let Some(parent) = storage_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ),
            ))
        })?;
    }

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let tmp_path = storage_path.with_extension(format!("{}.{}.partial", std::process::id(), nanos));

    fs::write(&tmp_path, bytes).map_err(|e| {
        FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write file to {}: {}", tmp_path.display(), e),
        ))
    })?;

    if let Err(e) = fs::rename(&tmp_path, storage_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to move file to {}: {}", storage_path.display(), e),
        )));
    }

    Ok(())
}
