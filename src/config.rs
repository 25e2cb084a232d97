//! Pipeline configuration.
//!
//! Every knob the pipeline needs (directory layout, bounding box, the EXIF tag
//! table, bucket name, sync command) lives in a single [`PipelineConfig`]
//! value that is built once at startup and passed to each stage. Nothing is
//! read from process-wide state after that.
//!
//! ## Config File Location
//!
//! `photoshelf.toml` in the working directory, or whatever `--config` points
//! at. A missing file is not an error: stock defaults are used.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! photos = "photos"             # Source photos, one directory per collection
//! info = "info"                 # Metadata records
//! thumbnails = "thumbnails"     # Derived previews
//! output = "docs/index.html"    # Rendered gallery index
//!
//! [scan]
//! extensions = ["jpg", "jpeg"]  # Case-insensitive
//!
//! [thumbnails]
//! max_width = 1024
//! max_height = 768
//! quality = 90
//!
//! [metadata]
//! command = "exiftool"
//! args = ["-json"]
//!
//! [[metadata.fields]]
//! tag = "Make"
//! field = "make"
//!
//! [remote]
//! bucket = "photos.example.com"
//! photos_prefix = "photos"
//! thumbnails_prefix = "thumbnails"
//! sync_command = "gsutil"
//! sync_args = ["-m", "rsync", "-r", "-d"]
//! # storage_root = "https://storage.googleapis.com/photos.example.com/"
//!
//! [site]
//! title = "Photos"
//!
//! [processing]
//! # max_processes = 4
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. The user file is merged on top of the stock
//! defaults table by table, so overriding `remote.bucket` keeps every other
//! `[remote]` key. Arrays (including `[[metadata.fields]]`) replace the
//! default array wholesale.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "photoshelf.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full pipeline configuration.
///
/// All fields have defaults matching the historical hardcoded constants
/// (except the bucket name, which is a placeholder).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Local directory layout.
    pub paths: PathsConfig,
    /// Source photo discovery.
    pub scan: ScanConfig,
    /// Thumbnail bounding box and encoding.
    pub thumbnails: ThumbnailsConfig,
    /// External metadata tool and tag table.
    pub metadata: MetadataConfig,
    /// Remote bucket and sync transport.
    pub remote: RemoteConfig,
    /// Rendered page settings.
    pub site: SiteConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.max_width == 0 || self.thumbnails.max_height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_width and thumbnails.max_height must be non-zero".into(),
            ));
        }
        if self.thumbnails.quality == 0 || self.thumbnails.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        if self.metadata.fields.is_empty() {
            return Err(ConfigError::Validation(
                "metadata.fields must not be empty".into(),
            ));
        }
        if let Some(reserved) = self
            .metadata
            .fields
            .iter()
            .find(|m| m.field == crate::store::THUMBNAIL_URL || m.field == crate::store::FULL_URL)
        {
            return Err(ConfigError::Validation(format!(
                "metadata.fields: tag {} maps to reserved field {}",
                reserved.tag, reserved.field
            )));
        }
        if self.metadata.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "metadata.command must not be empty".into(),
            ));
        }
        if self.remote.bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.bucket must not be empty".into(),
            ));
        }
        if self.remote.sync_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.sync_command must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Public URL prefix that object keys are appended to in the rendered index.
    ///
    /// Always ends with `/`.
    pub fn storage_root(&self) -> String {
        let root = match &self.remote.storage_root {
            Some(root) => root.clone(),
            None => format!("https://storage.googleapis.com/{}/", self.remote.bucket),
        };
        if root.ends_with('/') {
            root
        } else {
            format!("{root}/")
        }
    }

    /// Thumbnail bounding box as `(width, height)`.
    pub fn bounding_box(&self) -> (u32, u32) {
        (self.thumbnails.max_width, self.thumbnails.max_height)
    }
}

/// Local directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Source root. Each immediate parent directory of a photo is its collection.
    pub photos: PathBuf,
    /// Root of the metadata record tree.
    pub info: PathBuf,
    /// Root of the thumbnail tree.
    pub thumbnails: PathBuf,
    /// Path of the rendered HTML index.
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            photos: PathBuf::from("photos"),
            info: PathBuf::from("info"),
            thumbnails: PathBuf::from("thumbnails"),
            output: PathBuf::from("docs/index.html"),
        }
    }
}

/// Source photo discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions treated as photos, compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Thumbnail bounding box and encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Maximum thumbnail width in pixels.
    pub max_width: u32,
    /// Maximum thumbnail height in pixels.
    pub max_height: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 768,
            quality: 90,
        }
    }
}

/// One row of the raw-tag → canonical-field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    /// Tag name as printed by the metadata tool (e.g. `DateTimeOriginal`).
    pub tag: String,
    /// Canonical record field (e.g. `datetime`).
    pub field: String,
}

impl FieldMapping {
    pub fn new(tag: &str, field: &str) -> Self {
        Self {
            tag: tag.to_string(),
            field: field.to_string(),
        }
    }
}

/// External metadata tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Program to run. Must print a JSON array of objects.
    pub command: String,
    /// Arguments placed before the photo path.
    pub args: Vec<String>,
    /// Ordered lookup table. Later rows win when two tags map to one field.
    pub fields: Vec<FieldMapping>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            command: "exiftool".to_string(),
            args: vec!["-json".to_string()],
            fields: default_field_table(),
        }
    }
}

/// The canonical tag table.
pub fn default_field_table() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new("Make", "make"),
        FieldMapping::new("Model", "model"),
        FieldMapping::new("ExposureTime", "exposure"),
        FieldMapping::new("FNumber", "f"),
        FieldMapping::new("ISO", "iso"),
        FieldMapping::new("DateTimeOriginal", "datetime"),
        FieldMapping::new("FocalLength", "focal_length"),
        FieldMapping::new("Lens", "lens"),
        FieldMapping::new("LensInfo", "lens"),
        FieldMapping::new("LensModel", "lens"),
        FieldMapping::new("ShutterSpeed", "shutter"),
        FieldMapping::new("HistorySoftwareAgent", "edited_with"),
    ]
}

/// Remote bucket and sync transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Bucket name, without the `gs://` scheme.
    pub bucket: String,
    /// Prefix that mirrors `paths.photos`.
    pub photos_prefix: String,
    /// Prefix that mirrors `paths.thumbnails`.
    pub thumbnails_prefix: String,
    /// Sync program.
    pub sync_command: String,
    /// Arguments placed before `<local dir> <remote url>`.
    pub sync_args: Vec<String>,
    /// Public URL prefix for rendered links. Derived from `bucket` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bucket: "photos.example.com".to_string(),
            photos_prefix: "photos".to_string(),
            thumbnails_prefix: "thumbnails".to_string(),
            sync_command: "gsutil".to_string(),
            sync_args: ["-m", "rsync", "-r", "-d"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            storage_root: None,
        }
    }
}

/// Rendered page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Page `<title>` and heading.
    pub title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Photos".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel ingest workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load the config file at `path`.
///
/// A missing file yields the stock defaults. An existing file is merged on
/// top of the defaults, deserialized (rejecting unknown keys), and validated.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = if path.exists() {
        let content = fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;
        merge_toml(base, overlay)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        base
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photoshelf configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directory layout
# ---------------------------------------------------------------------------
[paths]
# Source photos. Each photo's parent directory name is its collection key
# (conventionally a date such as 2023-05-01).
photos = "photos"
# One metadata record per processed photo: info/<collection>/<name>.toml
info = "info"
# One preview per processed photo: thumbnails/<collection>/<name>
thumbnails = "thumbnails"
# Rendered gallery index.
output = "docs/index.html"

# ---------------------------------------------------------------------------
# Discovery
# ---------------------------------------------------------------------------
[scan]
# Extensions treated as photos (case-insensitive).
extensions = ["jpg", "jpeg"]

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Bounding box. Images are scaled down to fit, never up.
max_width = 1024
max_height = 768
# JPEG quality (1-100).
quality = 90

# ---------------------------------------------------------------------------
# Metadata extraction
# ---------------------------------------------------------------------------
[metadata]
# Must print a JSON array whose first element is an object of tag -> value.
command = "exiftool"
args = ["-json"]

# Tag table. Tags not listed are dropped. When several tags map to the same
# field, the one listed last wins. Replacing this list replaces all of it.
[[metadata.fields]]
tag = "Make"
field = "make"

[[metadata.fields]]
tag = "Model"
field = "model"

[[metadata.fields]]
tag = "ExposureTime"
field = "exposure"

[[metadata.fields]]
tag = "FNumber"
field = "f"

[[metadata.fields]]
tag = "ISO"
field = "iso"

[[metadata.fields]]
tag = "DateTimeOriginal"
field = "datetime"

[[metadata.fields]]
tag = "FocalLength"
field = "focal_length"

[[metadata.fields]]
tag = "Lens"
field = "lens"

[[metadata.fields]]
tag = "LensInfo"
field = "lens"

[[metadata.fields]]
tag = "LensModel"
field = "lens"

[[metadata.fields]]
tag = "ShutterSpeed"
field = "shutter"

[[metadata.fields]]
tag = "HistorySoftwareAgent"
field = "edited_with"

# ---------------------------------------------------------------------------
# Remote storage
# ---------------------------------------------------------------------------
[remote]
bucket = "photos.example.com"
photos_prefix = "photos"
thumbnails_prefix = "thumbnails"
# Invoked as: <sync_command> <sync_args...> <local dir> gs://<bucket>/<prefix>
# "-d" deletes remote objects that no longer exist locally (mirror).
sync_command = "gsutil"
sync_args = ["-m", "rsync", "-r", "-d"]
# Public URL prefix used for links in the index.
# storage_root = "https://storage.googleapis.com/photos.example.com/"

# ---------------------------------------------------------------------------
# Rendered page
# ---------------------------------------------------------------------------
[site]
title = "Photos"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel ingest workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
