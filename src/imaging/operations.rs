//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_fit_dimensions;
use super::params::{Quality, ThumbnailParams};
use crate::config::ThumbnailsConfig;
use crate::types::SourcePhoto;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Configuration for thumbnail generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailConfig {
    /// Bounding box (max width, max height).
    pub bounds: (u32, u32),
    pub quality: Quality,
}

impl ThumbnailConfig {
    pub fn from_config(config: &ThumbnailsConfig) -> Self {
        Self {
            bounds: (config.max_width, config.max_height),
            quality: Quality::new(config.quality),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self::from_config(&ThumbnailsConfig::default())
    }
}

/// A written thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Location on disk.
    pub path: PathBuf,
    /// `<collection>/<file name>`, relative to the thumbnails root.
    pub relative_path: String,
    pub width: u32,
    pub height: u32,
}

/// Plan a thumbnail operation without executing it.
pub fn plan_thumbnail(
    source: &Path,
    output: &Path,
    source_dims: (u32, u32),
    config: &ThumbnailConfig,
) -> ThumbnailParams {
    let (width, height) = calculate_fit_dimensions(source_dims, config.bounds);
    ThumbnailParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        quality: config.quality,
    }
}

/// Create the bounded preview for `photo` under `thumbnails_root`.
///
/// The output keeps the original file name and lives in a directory named
/// after the collection, which is created if needed. An existing file at that
/// location is overwritten.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    photo: &SourcePhoto,
    thumbnails_root: &Path,
    config: &ThumbnailConfig,
) -> Result<Thumbnail> {
    let dims = backend.identify(&photo.path)?;

    let output_dir = thumbnails_root.join(&photo.collection);
    std::fs::create_dir_all(&output_dir)?;
    let output = output_dir.join(&photo.file_name);

    let params = plan_thumbnail(&photo.path, &output, (dims.width, dims.height), config);
    backend.thumbnail(&params)?;

    Ok(Thumbnail {
        path: output,
        relative_path: format!("{}/{}", photo.collection, photo.file_name),
        width: params.width,
        height: params.height,
    })
}
