//! Content-addressed blob storage.
//!
//! Every blob lives in a single flat directory (`<project>/images/`) under a
//! filename equal to the hex-encoded SHA-256 of its bytes, with no extension:
//!
//! ```text
//! images/
//! ├── 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! └── e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
//! ```
//!
//! Identical bytes always land on the same file, so importing the same
//! photo twice stores it once. The store has no knowledge of assets or
//! representations, and there is no delete operation: a blob whose last
//! catalog reference is gone stays on disk.
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place, so a reader never observes a half-written blob. Concurrent
//! writes of the same identifier race harmlessly: both carry the same bytes
//! and the last rename wins.

use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error writing blob {identifier}: {source}")]
    Io {
        identifier: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid blob identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// SHA-256 of `bytes` as a 64-character lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Blob store rooted at a single directory.
///
/// Cloning is cheap: the store holds nothing but its root path.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `identifier`, replacing any existing blob.
    pub fn store(&self, bytes: &[u8], identifier: &str) -> Result<(), StoreError> {
        validate_identifier(identifier)?;
        let io_err = |source| StoreError::Io {
            identifier: identifier.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.persist(self.root.join(identifier))
            .map_err(|e| io_err(e.error))?;

        debug!(identifier, len = bytes.len(), "stored blob");
        Ok(())
    }

    /// Read the blob stored under `identifier`.
    ///
    /// Returns `None` when the blob does not exist. Any other read failure is
    /// logged and also reported as `None`: callers treat a missing blob as
    /// "representation unavailable" regardless of the cause.
    pub fn load(&self, identifier: &str) -> Option<Vec<u8>> {
        if validate_identifier(identifier).is_err() {
            warn!(identifier, "refusing to load blob with invalid identifier");
            return None;
        }
        match std::fs::read(self.root.join(identifier)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(identifier, error = %e, "failed to read blob");
                None
            }
        }
    }

    /// Whether a blob exists under `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        validate_identifier(identifier).is_ok() && self.root.join(identifier).is_file()
    }
}

/// Identifiers become filenames inside the root, so anything that could
/// escape it (separators, `..`, empty strings) is rejected.
fn validate_identifier(identifier: &str) -> Result<(), StoreError> {
    let valid = !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(identifier.to_string()))
    }
}
