//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations thumbnailing needs:
//! identify and thumbnail. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ThumbnailParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` because ingest workers share one backend across the rayon pool.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source, scale to the exact target size, write the output.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}
