//! Incremental ingest.
//!
//! Stage 1 of the build. Takes the photos found by [`scan`](crate::scan) and
//! produces, for each photo not seen before, one thumbnail and one metadata
//! record.
//!
//! ## Per-photo flow
//!
//! ```text
//! record exists? ── yes ──► Skipped (nothing read, nothing written)
//!       │ no
//!       ▼
//! extract metadata ── error ──► Failed (no record; retried next run)
//!       ▼
//! write thumbnail ─── error ──► Failed (no record; retried next run)
//!       ▼
//! write record (create-if-absent) ── error ──► abort the run
//!       ▼
//!   Processed
//! ```
//!
//! The record is written last, so a photo only counts as done once both its
//! metadata and its thumbnail exist. The converse is not guaranteed: a record
//! whose thumbnail was later deleted or damaged is never repaired, because the
//! record alone gates re-processing.
//!
//! ## Parallel Processing
//!
//! Photos are independent, so they are processed on the rayon pool. Two
//! workers never race on one identity: scan removes colliding identities, and
//! the record write is an atomic create-if-absent regardless. Results are
//! sorted by identity before they are returned, so the report does not depend
//! on scheduling.

use crate::imaging::{BackendError, ImageBackend, ThumbnailConfig, create_thumbnail};
use crate::metadata::{ExtractError, MetadataExtractor};
use crate::store::{MetadataRecord, RecordStore, StoreError, WriteOutcome};
use crate::types::{RecordId, SourcePhoto};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that abort the whole ingest run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to store metadata for {photo}: {source}")]
    Store {
        photo: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Why a single photo could not be processed. Never aborts the run.
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("metadata extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("thumbnail failed: {0}")]
    Thumbnail(#[from] BackendError),
}

/// Where derived artifacts go and how they are keyed in the bucket.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the thumbnail tree.
    pub thumbnails_dir: PathBuf,
    pub thumbnail: ThumbnailConfig,
    /// Bucket prefix for originals, e.g. `photos`.
    pub photos_prefix: String,
    /// Bucket prefix for thumbnails, e.g. `thumbnails`.
    pub thumbnails_prefix: String,
}

impl IngestConfig {
    pub fn from_pipeline_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            thumbnails_dir: config.paths.thumbnails.clone(),
            thumbnail: ThumbnailConfig::from_config(&config.thumbnails),
            photos_prefix: config.remote.photos_prefix.clone(),
            thumbnails_prefix: config.remote.thumbnails_prefix.clone(),
        }
    }

    /// Bucket key of the original photo.
    pub fn full_key(&self, photo: &SourcePhoto) -> String {
        object_key(&self.photos_prefix, &photo.relative_path)
    }

    /// Bucket key of a thumbnail given its path relative to the thumbnails root.
    pub fn thumbnail_key(&self, relative: &str) -> String {
        object_key(&self.thumbnails_prefix, relative)
    }
}

fn object_key(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}

/// What happened to one photo.
#[derive(Debug)]
pub enum PhotoOutcome {
    /// A record and thumbnail were created.
    Processed {
        id: RecordId,
        source: PathBuf,
        thumbnail: PathBuf,
        dimensions: (u32, u32),
    },
    /// A record already existed.
    Skipped { id: RecordId, source: PathBuf },
    /// Extraction or thumbnailing failed; no record was written.
    Failed {
        id: RecordId,
        source: PathBuf,
        error: PhotoError,
    },
}

impl PhotoOutcome {
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Processed { id, .. } | Self::Skipped { id, .. } | Self::Failed { id, .. } => id,
        }
    }
}

/// Progress events emitted while ingest runs, for live CLI output.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Started { total: usize },
    Processed { id: RecordId, source: String },
    Skipped { id: RecordId },
    Failed { id: RecordId, source: String, error: String },
}

/// Summary of an ingest run. Outcomes are sorted by identity.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<PhotoOutcome>,
}

impl IngestReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::Processed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &PhotoOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PhotoOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&PhotoOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Ingest every photo in `photos` that has no record in `store` yet.
///
/// The thumbnail root is created up front, so it exists for publishing even
/// when no thumbnail was written. Per-photo extraction and thumbnail failures
/// are reported in the returned [`IngestReport`]; a store failure aborts with
/// [`ProcessError`].
pub fn ingest(
    photos: &[SourcePhoto],
    store: &RecordStore,
    extractor: &impl MetadataExtractor,
    backend: &impl ImageBackend,
    config: &IngestConfig,
    events: Option<Sender<IngestEvent>>,
) -> Result<IngestReport, ProcessError> {
    std::fs::create_dir_all(&config.thumbnails_dir).map_err(|source| ProcessError::Io {
        path: config.thumbnails_dir.clone(),
        source,
    })?;

    let events = events.map(Mutex::new);
    let emit = |event: IngestEvent| {
        if let Some(tx) = &events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.lock().map(|tx| tx.send(event));
        }
    };

    emit(IngestEvent::Started {
        total: photos.len(),
    });

    let results: Vec<Result<PhotoOutcome, ProcessError>> = photos
        .par_iter()
        .map(|photo| {
            let outcome = ingest_one(photo, store, extractor, backend, config)?;
            emit(event_for(&outcome));
            Ok(outcome)
        })
        .collect();

    let mut outcomes = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    outcomes.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(IngestReport { outcomes })
}

fn ingest_one(
    photo: &SourcePhoto,
    store: &RecordStore,
    extractor: &impl MetadataExtractor,
    backend: &impl ImageBackend,
    config: &IngestConfig,
) -> Result<PhotoOutcome, ProcessError> {
    let id = photo.record_id();
    if store.exists(&id) {
        tracing::debug!(%id, "already processed");
        return Ok(PhotoOutcome::Skipped {
            id,
            source: photo.path.clone(),
        });
    }

    tracing::info!(photo = %photo.path.display(), "processing");
    let derived = derive(photo, extractor, backend, config);
    let (record, thumbnail, dimensions) = match derived {
        Ok(parts) => parts,
        Err(error) => {
            tracing::warn!(photo = %photo.path.display(), %error, "photo failed, will retry next run");
            return Ok(PhotoOutcome::Failed {
                id,
                source: photo.path.clone(),
                error,
            });
        }
    };

    match store.write(&id, &record) {
        Ok(WriteOutcome::Created) => Ok(PhotoOutcome::Processed {
            id,
            source: photo.path.clone(),
            thumbnail,
            dimensions,
        }),
        // Lost a race with another writer for the same identity.
        Ok(WriteOutcome::AlreadyExists) => Ok(PhotoOutcome::Skipped {
            id,
            source: photo.path.clone(),
        }),
        Err(source) => Err(ProcessError::Store {
            photo: photo.path.clone(),
            source,
        }),
    }
}

/// Extract metadata and write the thumbnail, returning the finished record.
fn derive(
    photo: &SourcePhoto,
    extractor: &impl MetadataExtractor,
    backend: &impl ImageBackend,
    config: &IngestConfig,
) -> Result<(MetadataRecord, PathBuf, (u32, u32)), PhotoError> {
    let fields = extractor.extract(&photo.path)?;
    let thumbnail = create_thumbnail(backend, photo, &config.thumbnails_dir, &config.thumbnail)?;
    let record = MetadataRecord::new(
        fields,
        config.thumbnail_key(&thumbnail.relative_path),
        config.full_key(photo),
    );
    Ok((record, thumbnail.path, (thumbnail.width, thumbnail.height)))
}

fn event_for(outcome: &PhotoOutcome) -> IngestEvent {
    match outcome {
        PhotoOutcome::Processed { id, source, .. } => IngestEvent::Processed {
            id: id.clone(),
            source: display(source),
        },
        PhotoOutcome::Skipped { id, .. } => IngestEvent::Skipped { id: id.clone() },
        PhotoOutcome::Failed { id, source, error } => IngestEvent::Failed {
            id: id.clone(),
            source: display(source),
            error: error.to_string(),
        },
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        photos_dir: PathBuf,
        store: RecordStore,
        config: IngestConfig,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let photos_dir = tmp.path().join("photos");
        for rel in files {
            touch(&photos_dir.join(rel));
        }
        let store = RecordStore::new(tmp.path().join("info"));
        let config = IngestConfig {
            thumbnails_dir: tmp.path().join("thumbnails"),
            thumbnail: ThumbnailConfig::default(),
            photos_prefix: "photos".into(),
            thumbnails_prefix: "thumbnails".into(),
        };
        Fixture {
            _tmp: tmp,
            photos_dir,
            store,
            config,
        }
    }

    fn discover(f: &Fixture) -> Vec<SourcePhoto> {
        scan_photos(&f.photos_dir)
    }

    #[test]
    fn processes_each_new_photo_exactly_once() {
        let f = fixture(&["d1/a.jpg", "d1/B.JPG", "d2/c.jpeg"]);
        let photos = discover(&f);
        let extractor = MockExtractor::with_datetime("2023:01:01 10:00:00");
        let backend = MockBackend::new();

        let report = ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();

        assert_eq!(report.processed(), 3);
        assert_eq!(report.skipped(), 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(extractor.call_count(), 3);
        assert_eq!(backend.thumbnail_count(), 3);
        for id in [
            RecordId::new("d1", "a.jpg"),
            RecordId::new("d1", "b.jpg"),
            RecordId::new("d2", "c.jpeg"),
        ] {
            assert!(f.store.exists(&id), "missing record {id}");
        }
        assert!(f.config.thumbnails_dir.join("d1/B.JPG").exists());
        assert_eq!(f.store.read_all().unwrap().len(), 3);
    }

    #[test]
    fn record_carries_fields_and_locations() {
        let f = fixture(&["2023-05-01/IMG2.jpg"]);
        let photos = discover(&f);
        let mut fields = BTreeMap::new();
        fields.insert("make".to_string(), "FUJIFILM".to_string());
        fields.insert("datetime".to_string(), "2023:05:01 18:22:05".to_string());
        let extractor = MockExtractor::new(fields);

        ingest(&photos, &f.store, &extractor, &MockBackend::new(), &f.config, None).unwrap();

        let record = f
            .store
            .read(&RecordId::new("2023-05-01", "IMG2.jpg"))
            .unwrap();
        assert_eq!(record.get("make"), Some("FUJIFILM"));
        assert_eq!(
            record.thumbnail_url(),
            Some("thumbnails/2023-05-01/IMG2.jpg")
        );
        assert_eq!(record.full_url(), Some("photos/2023-05-01/IMG2.jpg"));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let f = fixture(&["d1/a.jpg", "d1/b.jpg"]);
        let photos = discover(&f);
        let extractor = MockExtractor::with_datetime("2023:01:01 10:00:00");
        let backend = MockBackend::new();
        ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();
        let record_before = std::fs::read(f.store.path_for(&RecordId::new("d1", "a.jpg"))).unwrap();
        let thumb = f.config.thumbnails_dir.join("d1/a.jpg");
        let thumb_mtime = std::fs::metadata(&thumb).unwrap().modified().unwrap();

        let extractor = MockExtractor::with_datetime("2024:01:01 10:00:00");
        let backend = MockBackend::new();
        let report = ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();

        assert_eq!(report.processed(), 0);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(extractor.call_count(), 0);
        assert!(backend.get_operations().is_empty());
        assert_eq!(
            std::fs::read(f.store.path_for(&RecordId::new("d1", "a.jpg"))).unwrap(),
            record_before
        );
        assert_eq!(
            std::fs::metadata(&thumb).unwrap().modified().unwrap(),
            thumb_mtime
        );
    }

    #[test]
    fn preseeded_record_skips_collaborators() {
        let f = fixture(&["d1/IMG_1.JPG"]);
        let id = RecordId::new("d1", "IMG_1.JPG");
        f.store
            .write(
                &id,
                &MetadataRecord::new(BTreeMap::new(), "t".into(), "f".into()),
            )
            .unwrap();
        let extractor = MockExtractor::with_datetime("2023:01:01 10:00:00");
        let backend = MockBackend::new();

        let report =
            ingest(&discover(&f), &f.store, &extractor, &backend, &f.config, None).unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(extractor.call_count(), 0);
        assert_eq!(backend.get_operations().len(), 0);
    }

    #[test]
    fn skip_holds_even_when_thumbnail_is_missing() {
        let f = fixture(&["d1/a.jpg"]);
        let photos = discover(&f);
        ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            None,
        )
        .unwrap();
        std::fs::remove_file(f.config.thumbnails_dir.join("d1/a.jpg")).unwrap();

        let backend = MockBackend::new();
        let report = ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &backend,
            &f.config,
            None,
        )
        .unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(backend.thumbnail_count(), 0);
        assert!(!f.config.thumbnails_dir.join("d1/a.jpg").exists());
    }

    #[test]
    fn extraction_failure_is_isolated_and_retryable() {
        let f = fixture(&["d1/bad.jpg", "d1/good.jpg"]);
        let photos = discover(&f);
        let bad = f.photos_dir.join("d1/bad.jpg");
        let extractor =
            MockExtractor::with_datetime("2023:01:01 10:00:00").failing_on(vec![bad.clone()]);
        let backend = MockBackend::new();

        let report = ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.failures().next(),
            Some(PhotoOutcome::Failed {
                error: PhotoError::Extract(_),
                ..
            })
        ));
        assert!(!f.store.exists(&RecordId::new("d1", "bad.jpg")));
        assert!(!f.config.thumbnails_dir.join("d1/bad.jpg").exists());

        // Next run retries only the failed photo.
        let extractor = MockExtractor::with_datetime("2023:01:01 10:00:00");
        let report = ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();
        assert_eq!(report.processed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(extractor.call_count(), 1);
        assert!(f.store.exists(&RecordId::new("d1", "bad.jpg")));
    }

    #[test]
    fn thumbnail_failure_leaves_no_record() {
        let f = fixture(&["d1/corrupt.jpg", "d1/fine.jpg"]);
        let photos = discover(&f);
        let corrupt = f.photos_dir.join("d1/corrupt.jpg");
        let backend = MockBackend::failing_on(vec![corrupt]);
        let extractor = MockExtractor::with_datetime("2023:01:01 10:00:00");

        let report = ingest(&photos, &f.store, &extractor, &backend, &f.config, None).unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.failures().next(),
            Some(PhotoOutcome::Failed {
                error: PhotoError::Thumbnail(_),
                ..
            })
        ));
        assert!(!f.store.exists(&RecordId::new("d1", "corrupt.jpg")));
        assert!(f.store.exists(&RecordId::new("d1", "fine.jpg")));
    }

    #[test]
    fn store_failure_aborts_run() {
        let f = fixture(&["d1/a.jpg"]);
        let photos = discover(&f);
        // A regular file where the info root should be makes every write fail.
        std::fs::write(f.store.root(), "not a directory").unwrap();

        let result = ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            None,
        );

        assert!(matches!(result, Err(ProcessError::Store { .. })));
    }

    #[test]
    fn empty_run_still_creates_thumbnail_root() {
        let f = fixture(&[]);
        assert!(!f.config.thumbnails_dir.exists());

        let report = ingest(
            &[],
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            None,
        )
        .unwrap();

        assert!(report.outcomes.is_empty());
        assert!(f.config.thumbnails_dir.is_dir());
    }

    #[test]
    fn unwritable_thumbnail_root_aborts_run() {
        let f = fixture(&["d1/a.jpg"]);
        let photos = discover(&f);
        std::fs::write(&f.config.thumbnails_dir, "not a directory").unwrap();

        let result = ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            None,
        );

        assert!(matches!(result, Err(ProcessError::Io { .. })));
    }

    #[test]
    fn report_is_sorted_by_identity() {
        let f = fixture(&["b/z.jpg", "a/y.jpg", "a/x.jpg", "c/w.jpg"]);
        let photos = discover(&f);
        let report = ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            None,
        )
        .unwrap();

        let ids: Vec<String> = report.outcomes.iter().map(|o| o.id().to_string()).collect();
        assert_eq!(ids, vec!["a/x.jpg", "a/y.jpg", "b/z.jpg", "c/w.jpg"]);
    }

    #[test]
    fn events_are_emitted_per_photo() {
        let f = fixture(&["d1/a.jpg", "d1/b.jpg"]);
        let photos = discover(&f);
        f.store
            .write(
                &RecordId::new("d1", "a.jpg"),
                &MetadataRecord::new(BTreeMap::new(), "t".into(), "f".into()),
            )
            .unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        ingest(
            &photos,
            &f.store,
            &MockExtractor::with_datetime("2023:01:01 10:00:00"),
            &MockBackend::new(),
            &f.config,
            Some(tx),
        )
        .unwrap();

        let events: Vec<IngestEvent> = rx.iter().collect();
        assert!(matches!(events[0], IngestEvent::Started { total: 2 }));
        assert_eq!(events.len(), 3);
        assert!(events.iter().any(|e| matches!(e, IngestEvent::Skipped { id } if id.name == "a.jpg")));
        assert!(events
            .iter()
            .any(|e| matches!(e, IngestEvent::Processed { id, .. } if id.name == "b.jpg")));
    }

    #[test]
    fn object_keys_join_prefix_and_relative_path() {
        assert_eq!(object_key("photos", "d/a.jpg"), "photos/d/a.jpg");
        assert_eq!(object_key("/photos/", "d/a.jpg"), "photos/d/a.jpg");
        assert_eq!(object_key("", "d/a.jpg"), "d/a.jpg");
    }
}
