//! Metadata extraction.
//!
//! Photo facts (camera, exposure, capture time, …) come from an external tool,
//! `exiftool` by default, run once per photo as `exiftool -json <path>`. The
//! tool speaks its own tag vocabulary; this module maps it onto the small
//! canonical field set stored in metadata records.
//!
//! ## Tag mapping
//!
//! The mapping is the ordered `[[metadata.fields]]` table from the config.
//! Tags not in the table are dropped silently, so new camera firmware adding
//! tags never breaks a run. When several tags map to one field (the three
//! lens tags do) the row listed last wins:
//!
//! ```text
//! Lens      → lens   "XF23mmF2 R WR"
//! LensInfo  → lens   "23mm f/2"
//! LensModel → lens   "XF23mmF2 R WR"   ← kept
//! ```
//!
//! ## Values
//!
//! Records store strings only. The tool emits JSON, so numbers are kept in
//! their printed form (`2.8`, `400`), booleans become `true`/`false`, lists
//! and objects are stored as compact JSON, and `null` is dropped.

use crate::config::{FieldMapping, MetadataConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Canonical field name → value.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unreadable metadata output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected metadata output: {0}")]
    Malformed(String),
}

/// Source of per-photo metadata.
///
/// `Sync` so a single extractor can be shared by all ingest workers.
pub trait MetadataExtractor: Sync {
    /// Extract canonical fields for one photo.
    fn extract(&self, path: &Path) -> Result<FieldMap, ExtractError>;
}

/// Extractor backed by an `exiftool`-compatible command.
#[derive(Debug, Clone)]
pub struct ExifTool {
    command: String,
    args: Vec<String>,
    fields: Vec<FieldMapping>,
}

impl ExifTool {
    pub fn new(config: &MetadataConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            fields: config.fields.clone(),
        }
    }
}

impl MetadataExtractor for ExifTool {
    fn extract(&self, path: &Path) -> Result<FieldMap, ExtractError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|source| ExtractError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractError::ToolFailed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = parse_tool_output(&output.stdout)?;
        Ok(map_fields(&raw, &self.fields))
    }
}

/// Parse the tool's stdout: a JSON array whose first element is a tag object.
pub fn parse_tool_output(stdout: &[u8]) -> Result<serde_json::Map<String, Value>, ExtractError> {
    let value: Value = serde_json::from_slice(stdout)?;
    let Value::Array(items) = value else {
        return Err(ExtractError::Malformed("expected a JSON array".into()));
    };
    match items.into_iter().next() {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ExtractError::Malformed(
            "expected the first array element to be an object".into(),
        )),
        None => Err(ExtractError::Malformed("empty result array".into())),
    }
}

/// Map raw tool tags onto canonical fields using `table`.
///
/// Rows are applied in order, so for a field fed by several tags the last
/// present tag wins. Tags missing from the table are ignored.
pub fn map_fields(raw: &serde_json::Map<String, Value>, table: &[FieldMapping]) -> FieldMap {
    let mut fields = FieldMap::new();
    for mapping in table {
        if let Some(value) = raw.get(&mapping.tag).and_then(value_to_string) {
            fields.insert(mapping.field.clone(), value);
        }
    }
    fields
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
