//! Durable metadata records.
//!
//! One small TOML document per processed photo, under the info root:
//!
//! ```text
//! info/
//! └── 2023-05-01/
//!     ├── img1.jpg.toml
//!     └── img2.jpg.toml
//! ```
//!
//! ```toml
//! datetime = "2023:05:01 18:22:05"
//! full_url = "photos/2023-05-01/IMG2.jpg"
//! make = "FUJIFILM"
//! model = "X100V"
//! thumbnail_url = "thumbnails/2023-05-01/IMG2.jpg"
//! ```
//!
//! # Idempotency
//!
//! The existence of a record file is the only "already processed" signal the
//! pipeline has. [`RecordStore::exists`] is a plain filesystem check, so it
//! survives restarts. [`RecordStore::write`] is write-once: the document is
//! written to a temp file in the target directory and moved into place with a
//! no-clobber rename. Concurrent writers for one identity cannot both succeed,
//! an existing record is never touched, and a crash mid-write leaves no
//! record at all (the photo is simply retried on the next run).

use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Suffix appended to the lower-cased photo file name.
pub const RECORD_SUFFIX: &str = ".toml";

/// Record field holding the bucket key of the thumbnail.
pub const THUMBNAIL_URL: &str = "thumbnail_url";
/// Record field holding the bucket key of the original.
pub const FULL_URL: &str = "full_url";
/// Record field holding the capture timestamp.
pub const DATETIME: &str = "datetime";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize record {id}: {source}")]
    Serialize {
        id: RecordId,
        #[source]
        source: toml::ser::Error,
    },
    #[error("Failed to parse record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to list records under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Derived facts about one photo. Field name → value, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    pub fields: BTreeMap<String, String>,
}

impl MetadataRecord {
    /// Build a record from extracted fields plus the two required locations.
    pub fn new(
        extracted: BTreeMap<String, String>,
        thumbnail_url: String,
        full_url: String,
    ) -> Self {
        let mut fields = extracted;
        fields.insert(THUMBNAIL_URL.to_string(), thumbnail_url);
        fields.insert(FULL_URL.to_string(), full_url);
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.get(THUMBNAIL_URL)
    }

    pub fn full_url(&self) -> Option<&str> {
        self.get(FULL_URL)
    }

    pub fn datetime(&self) -> Option<&str> {
        self.get(DATETIME)
    }
}

/// A record read back from disk together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub path: PathBuf,
    pub record: MetadataRecord,
}

/// Outcome of [`RecordStore::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    /// A record was already present; it was left untouched.
    AlreadyExists,
}

/// Metadata records rooted at the info directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<collection>/<name>.toml`
    pub fn path_for(&self, id: &RecordId) -> PathBuf {
        self.root
            .join(&id.collection)
            .join(format!("{}{}", id.name, RECORD_SUFFIX))
    }

    /// Whether a record for `id` has been written.
    pub fn exists(&self, id: &RecordId) -> bool {
        self.path_for(id).is_file()
    }

    /// Write `record` for `id` unless one already exists.
    pub fn write(&self, id: &RecordId, record: &MetadataRecord) -> Result<WriteOutcome, StoreError> {
        let path = self.path_for(id);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let body = toml::to_string(record).map_err(|source| StoreError::Serialize {
            id: id.clone(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(body.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(WriteOutcome::Created),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(%id, "record already present, left untouched");
                Ok(WriteOutcome::AlreadyExists)
            }
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    /// Read the record for `id`.
    pub fn read(&self, id: &RecordId) -> Result<MetadataRecord, StoreError> {
        read_record(&self.path_for(id))
    }

    /// Read every record under the root. Order is unspecified.
    ///
    /// A missing root means nothing has been ingested yet and yields an
    /// empty list.
    pub fn read_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|source| StoreError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(id) = record_id_for(entry.path()) else {
                continue;
            };
            let record = read_record(entry.path())?;
            records.push(StoredRecord {
                id,
                path: entry.into_path(),
                record,
            });
        }
        Ok(records)
    }
}

fn read_record(path: &Path) -> Result<MetadataRecord, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    toml::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Recover the identity from `<root>/<collection>/<name>.toml`.
///
/// Returns `None` for files that are not records (wrong suffix, hidden temp
/// files left by an interrupted write).
fn record_id_for(path: &Path) -> Option<RecordId> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    let name = file_name.strip_suffix(RECORD_SUFFIX)?;
    let collection = path.parent()?.file_name()?.to_str()?;
    Some(RecordId {
        collection: collection.to_string(),
        name: name.to_string(),
    })
}
