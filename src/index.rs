//! Gallery index aggregation.
//!
//! Stage 3 of the build. Reads every stored metadata record and orders them
//! newest first by capture time. The result feeds the renderer.
//!
//! Aggregation is all-or-nothing: one record without a usable `datetime`
//! fails the whole index, naming the offending record, so a bad record is
//! never silently dropped from the published page.

use crate::store::{MetadataRecord, RecordStore, StoreError};
use crate::types::RecordId;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// Accepted capture timestamp layouts: EXIF first, then ISO-like.
pub const TIMESTAMP_FORMATS: [&str; 2] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Record {id} ({path}) has no capture timestamp")]
    MissingTimestamp { id: RecordId, path: PathBuf },
    #[error("Record {id} ({path}) has unparseable capture timestamp {value:?}")]
    BadTimestamp {
        id: RecordId,
        path: PathBuf,
        value: String,
    },
}

/// One record ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryIndexEntry {
    pub id: RecordId,
    pub taken: NaiveDateTime,
    pub record: MetadataRecord,
}

/// Parse a capture timestamp in any of [`TIMESTAMP_FORMATS`].
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Load all records from `store`, newest first.
///
/// Ties on the capture instant are ordered by [`RecordId`] ascending.
pub fn build_index(store: &RecordStore) -> Result<Vec<GalleryIndexEntry>, IndexError> {
    let mut entries = store
        .read_all()?
        .into_iter()
        .map(|stored| {
            let Some(raw) = stored.record.datetime() else {
                return Err(IndexError::MissingTimestamp {
                    id: stored.id,
                    path: stored.path,
                });
            };
            let Some(taken) = parse_timestamp(raw) else {
                return Err(IndexError::BadTimestamp {
                    value: raw.to_string(),
                    id: stored.id,
                    path: stored.path,
                });
            };
            Ok(GalleryIndexEntry {
                id: stored.id,
                taken,
                record: stored.record,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    entries.sort_by(|a, b| b.taken.cmp(&a.taken).then_with(|| a.id.cmp(&b.id)));
    tracing::debug!(count = entries.len(), "index built");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, RecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path().join("info"));
        (tmp, store)
    }

    fn names(entries: &[GalleryIndexEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.name.as_str()).collect()
    }

    #[test]
    fn parses_exif_and_iso_layouts() {
        let exif = parse_timestamp("2023:05:01 18:22:05").unwrap();
        let iso = parse_timestamp("2023-05-01 18:22:05").unwrap();
        assert_eq!(exif, iso);
        assert_eq!(exif.to_string(), "2023-05-01 18:22:05");
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2023:05:01").is_none());
        assert!(parse_timestamp("2023:13:01 00:00:00").is_none());
    }

    #[test]
    fn orders_newest_first() {
        let (_tmp, store) = store();
        seed_record(&store, "d1", "a.jpg", Some("2023:01:01 10:00:00"));
        seed_record(&store, "d2", "b.jpg", Some("2023:06:15 09:30:00"));
        seed_record(&store, "d0", "c.jpg", Some("2022:12:31 23:59:59"));

        let entries = build_index(&store).unwrap();

        assert_eq!(names(&entries), vec!["b.jpg", "a.jpg", "c.jpg"]);
    }

    #[test]
    fn ties_are_ordered_by_identity() {
        let (_tmp, store) = store();
        seed_record(&store, "d2", "x.jpg", Some("2023:01:01 10:00:00"));
        seed_record(&store, "d1", "z.jpg", Some("2023:01:01 10:00:00"));
        seed_record(&store, "d1", "y.jpg", Some("2023-01-01 10:00:00"));

        let entries = build_index(&store).unwrap();

        let ids: Vec<String> = entries.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["d1/y.jpg", "d1/z.jpg", "d2/x.jpg"]);
    }

    #[test]
    fn empty_store_gives_empty_index() {
        let (_tmp, store) = store();
        assert!(build_index(&store).unwrap().is_empty());
    }

    #[test]
    fn missing_timestamp_fails_naming_record() {
        let (_tmp, store) = store();
        seed_record(&store, "d1", "good.jpg", Some("2023:01:01 10:00:00"));
        seed_record(&store, "d1", "NoDate.jpg", None);

        let err = build_index(&store).unwrap_err();

        match &err {
            IndexError::MissingTimestamp { id, .. } => assert_eq!(id.name, "nodate.jpg"),
            other => panic!("expected MissingTimestamp, got {other:?}"),
        }
        assert!(err.to_string().contains("d1/nodate.jpg"));
    }

    #[test]
    fn unparseable_timestamp_fails() {
        let (_tmp, store) = store();
        seed_record(&store, "d1", "a.jpg", Some("sometime in May"));

        let err = build_index(&store).unwrap_err();
        assert!(
            matches!(err, IndexError::BadTimestamp { ref value, .. } if value == "sometime in May")
        );
    }

    #[test]
    fn corrupt_record_surfaces_store_error() {
        let (_tmp, store) = store();
        seed_record(&store, "d1", "a.jpg", Some("2023:01:01 10:00:00"));
        std::fs::write(store.root().join("d1/broken.jpg.toml"), "not = [valid").unwrap();

        assert!(matches!(
            build_index(&store),
            Err(IndexError::Store(StoreError::Parse { .. }))
        ));
    }
}
