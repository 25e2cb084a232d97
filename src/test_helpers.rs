//! Shared test utilities for the photoshelf test suite.
//!
//! Provides fixture builders (empty photo files, seeded records) and a
//! counting [`MockExtractor`] that stands in for the external metadata tool.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! touch(&tmp.path().join("photos/2023-05-01/a.jpg"));
//! let photos = scan_photos(&tmp.path().join("photos"));
//!
//! let extractor = MockExtractor::with_datetime("2023:05:01 10:00:00");
//! // ... run ingest ...
//! assert_eq!(extractor.call_count(), 1);
//! ```

use crate::metadata::{ExtractError, FieldMap, MetadataExtractor};
use crate::store::{MetadataRecord, RecordStore};
use crate::types::{RecordId, SourcePhoto};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// =========================================================================
// Fixture setup
// =========================================================================

/// Create an empty file, including parent directories.
pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

/// Scan `root` with the default extensions. Panics on error.
pub fn scan_photos(root: &Path) -> Vec<SourcePhoto> {
    let extensions = vec!["jpg".to_string(), "jpeg".to_string()];
    crate::scan::scan(root, &extensions).unwrap().photos
}

/// Seed `store` with a record holding the given timestamp.
pub fn seed_record(store: &RecordStore, collection: &str, name: &str, datetime: Option<&str>) {
    let mut fields = FieldMap::new();
    if let Some(dt) = datetime {
        fields.insert("datetime".to_string(), dt.to_string());
    }
    fields.insert("make".to_string(), "FUJIFILM".to_string());
    let record = MetadataRecord::new(
        fields,
        format!("thumbnails/{collection}/{name}"),
        format!("photos/{collection}/{name}"),
    );
    store
        .write(&RecordId::new(collection, name), &record)
        .unwrap();
}

// =========================================================================
// Mock extractor
// =========================================================================

/// Extractor that returns fixed fields and counts invocations.
///
/// Paths listed in `failing` return [`ExtractError::Malformed`].
/// Uses Mutex so it is Sync and works with rayon's par_iter.
pub struct MockExtractor {
    pub fields: FieldMap,
    pub failing: Vec<PathBuf>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl MockExtractor {
    pub fn new(fields: FieldMap) -> Self {
        Self {
            fields,
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_datetime(datetime: &str) -> Self {
        let mut fields = FieldMap::new();
        fields.insert("datetime".to_string(), datetime.to_string());
        Self::new(fields)
    }

    pub fn failing_on(mut self, paths: Vec<PathBuf>) -> Self {
        self.failing = paths;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MetadataExtractor for MockExtractor {
    fn extract(&self, path: &Path) -> Result<FieldMap, ExtractError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.failing.iter().any(|p| p == path) {
            return Err(ExtractError::Malformed(format!(
                "mock failure for {}",
                path.display()
            )));
        }
        Ok(self.fields.clone())
    }
}
