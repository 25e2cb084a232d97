//! Shared types used across pipeline stages.
//!
//! [`SourcePhoto`] is produced by the scan stage and consumed by ingest;
//! [`RecordId`] is the key that ties a photo to its metadata record and its
//! thumbnail, and is what the idempotency gate checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One original image file discovered under the source root.
///
/// Never modified or deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePhoto {
    /// Path on disk (source root joined with `relative_path`).
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated. Used to build the
    /// object key of the original in the bucket.
    pub relative_path: String,
    /// Name of the immediate parent directory (the source root's own name
    /// for photos lying directly in it).
    pub collection: String,
    /// File name as found on disk, case preserved.
    pub file_name: String,
}

impl SourcePhoto {
    /// Build a photo from its path relative to the source root.
    ///
    /// A photo lying directly in the source root belongs to a collection
    /// named after the root directory itself. Returns `None` if a component
    /// is not UTF-8 or the root has no name (`/`).
    pub fn from_relative(root: &Path, relative: &Path) -> Option<Self> {
        let file_name = relative.file_name()?.to_str()?.to_string();
        let collection = match relative.parent()?.file_name() {
            Some(parent) => parent.to_str()?.to_string(),
            None => root_name(root)?,
        };
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        Some(Self {
            path: root.join(relative),
            relative_path,
            collection,
            file_name,
        })
    }

    /// Deterministic record identity: collection + lower-cased file name.
    pub fn record_id(&self) -> RecordId {
        RecordId::new(&self.collection, &self.file_name)
    }
}

/// Name of the source root directory, resolving `.` and `..` on disk.
fn root_name(root: &Path) -> Option<String> {
    let name = match root.file_name() {
        Some(name) => name.to_os_string(),
        None => root.canonicalize().ok()?.file_name()?.to_os_string(),
    };
    name.into_string().ok()
}

/// Identity of a metadata record / thumbnail pair.
///
/// Derived from the path alone, so it is stable across runs and independent
/// of file content. Ordering is collection first, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub collection: String,
    /// Lower-cased file name of the original.
    pub name: String,
}

impl RecordId {
    pub fn new(collection: &str, file_name: &str) -> Self {
        Self {
            collection: collection.to_string(),
            name: file_name.to_lowercase(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_relative_uses_parent_as_collection() {
        let photo =
            SourcePhoto::from_relative(Path::new("photos"), Path::new("2023-05-01/IMG2.jpg"))
                .unwrap();
        assert_eq!(photo.collection, "2023-05-01");
        assert_eq!(photo.file_name, "IMG2.jpg");
        assert_eq!(photo.relative_path, "2023-05-01/IMG2.jpg");
        assert_eq!(photo.path, Path::new("photos/2023-05-01/IMG2.jpg"));
    }

    #[test]
    fn from_relative_nested_uses_immediate_parent() {
        let photo = SourcePhoto::from_relative(
            Path::new("photos"),
            Path::new("2023/2023-05-01/a.jpg"),
        )
        .unwrap();
        assert_eq!(photo.collection, "2023-05-01");
        assert_eq!(photo.relative_path, "2023/2023-05-01/a.jpg");
    }

    #[test]
    fn from_relative_root_level_photo_uses_root_name() {
        let photo =
            SourcePhoto::from_relative(Path::new("/srv/photos"), Path::new("stray.jpg")).unwrap();
        assert_eq!(photo.collection, "photos");
        assert_eq!(photo.relative_path, "stray.jpg");
        assert_eq!(photo.record_id().to_string(), "photos/stray.jpg");
    }

    #[test]
    fn from_relative_root_level_under_dot_root_resolves_name() {
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.file_name().unwrap().to_str().unwrap().to_string();
        let photo = SourcePhoto::from_relative(Path::new("."), Path::new("a.jpg")).unwrap();
        assert_eq!(photo.collection, expected);
    }

    #[test]
    fn record_id_lowercases_name_only() {
        let id = RecordId::new("Trip-A", "IMG_0001.JPG");
        assert_eq!(id.collection, "Trip-A");
        assert_eq!(id.name, "img_0001.jpg");
        assert_eq!(id.to_string(), "Trip-A/img_0001.jpg");
    }

    #[test]
    fn record_ids_order_by_collection_then_name() {
        let mut ids = vec![
            RecordId::new("b", "a.jpg"),
            RecordId::new("a", "z.jpg"),
            RecordId::new("a", "b.jpg"),
        ];
        ids.sort();
        let shown: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(shown, vec!["a/b.jpg", "a/z.jpg", "b/a.jpg"]);
    }
}
