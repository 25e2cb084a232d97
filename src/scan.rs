//! Source photo discovery.
//!
//! First step of ingest. Walks the source root and returns every photo file,
//! each tagged with its collection key.
//!
//! ## Directory Structure
//!
//! ```text
//! photos/                      # Source root
//! ├── 2023-05-01/              # Collection (any name; dates by convention)
//! │   ├── img1.JPG
//! │   └── IMG2.jpg
//! ├── 2023/
//! │   └── 2023-06-15/          # Nested: collection is the immediate parent
//! │       └── dsc_0042.jpeg
//! ├── stray.jpg                # Directly in the root: collection "photos"
//! └── .trash/                  # Hidden: skipped
//! ```
//!
//! ## Rules
//!
//! - Extensions are matched case-insensitively against `scan.extensions`.
//! - Hidden files and directories (leading `.`) are ignored.
//! - Files directly under the root belong to a collection named after the
//!   root directory.
//! - Two files mapping to the same [`RecordId`](crate::types::RecordId)
//!   (`A.JPG` and `a.jpg` side by side) would race for one record; only the
//!   first in path order is kept.
//!
//! The collection key is treated as an opaque string, never parsed as a date.

use crate::types::SourcePhoto;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Failed to read source tree under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Result of walking the source root.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Photos to consider, sorted by relative path, identities unique.
    pub photos: Vec<SourcePhoto>,
    /// Photo files ignored because an earlier file has the same identity.
    pub duplicates: Vec<PathBuf>,
}

/// Discover all photos under `root`.
pub fn scan(root: &Path, extensions: &[String]) -> Result<ScanResult, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|source| ScanError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && has_photo_extension(entry.path(), extensions) {
            candidates.push(entry.into_path());
        }
    }

    let mut result = ScanResult::default();
    let mut seen = HashSet::new();
    for path in candidates {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let Some(photo) = SourcePhoto::from_relative(root, relative) else {
            tracing::warn!(path = %path.display(), "photo path is not valid UTF-8, skipping");
            continue;
        };
        if !seen.insert(photo.record_id()) {
            tracing::warn!(
                path = %path.display(),
                id = %photo.record_id(),
                "another photo already maps to this record, skipping"
            );
            result.duplicates.push(path);
            continue;
        }
        result.photos.push(photo);
    }

    tracing::debug!(
        root = %root.display(),
        photos = result.photos.len(),
        "scan complete"
    );
    Ok(result)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'))
}

/// Returns `true` if `path` has one of `extensions`, ignoring case.
pub fn has_photo_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}
