//! CLI output formatting for all pipeline stages.
//!
//! # Identity-First Display
//!
//! Every photo is shown by its record identity (`collection/name`), the key
//! the whole pipeline agrees on. Filesystem paths appear as secondary context
//! on indented `Source:` lines, so the output reads as an inventory of the
//! gallery while still letting users trace a line back to a file.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Collections
//! 001 2023-05-01 (2 photos)
//!     IMG2.jpg
//!     img1.JPG
//! 002 2023-06-15 (1 photo)
//!     dsc_0042.jpeg
//!
//! Skipped
//!     photos/2023-05-01/img2.JPG: same identity as an earlier photo
//! ```
//!
//! ## Ingest
//!
//! ```text
//! Ingesting 3 photos
//!     2023-05-01/img1.jpg: processed
//!         Source: photos/2023-05-01/img1.JPG
//!     2023-05-01/img2.jpg: already processed
//!     2023-06-15/dsc_0042.jpeg: FAILED
//!         Source: photos/2023-06-15/dsc_0042.jpeg
//!         Error: metadata extraction failed: ...
//! Ingest: 1 processed, 1 skipped, 1 failed
//! ```
//!
//! ## Publish
//!
//! ```text
//! photos → gs://photos.example.com/photos
//! thumbnails → gs://photos.example.com/thumbnails
//! ```
//!
//! ## Index
//!
//! ```text
//! 001 2023-06-15 09:30 2023-06-15/dsc_0042.jpeg
//! 002 2023-05-01 18:22 2023-05-01/img2.jpg
//! Wrote 2 photos → docs/index.html
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and, where the binary prints it in one go, a `print_*` wrapper that writes
//! to stdout. Format functions are pure: no I/O, no side effects.

use crate::index::GalleryIndexEntry;
use crate::process::{IngestEvent, IngestReport, PhotoOutcome};
use crate::publish::PublishReport;
use crate::scan::ScanResult;
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Scan output
// ============================================================================

/// Format discovered photos grouped by collection, plus anything skipped.
pub fn format_scan_output(result: &ScanResult) -> Vec<String> {
    let mut lines = Vec::new();

    let mut collections: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for photo in &result.photos {
        collections
            .entry(photo.collection.as_str())
            .or_default()
            .push(photo.file_name.as_str());
    }

    lines.push("Collections".to_string());
    if collections.is_empty() {
        lines.push(format!("{}(no photos found)", indent(1)));
    }
    for (pos, (collection, files)) in collections.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(pos + 1),
            collection,
            plural(files.len(), "photo")
        ));
        for file in files {
            lines.push(format!("{}{}", indent(1), file));
        }
    }

    if !result.duplicates.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for path in &result.duplicates {
            lines.push(format!(
                "{}{}: same identity as an earlier photo",
                indent(1),
                path.display()
            ));
        }
    }

    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(result: &ScanResult) {
    for line in format_scan_output(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Ingest output
// ============================================================================

/// Format a single ingest progress event as display lines.
pub fn format_ingest_event(event: &IngestEvent) -> Vec<String> {
    match event {
        IngestEvent::Started { total } => {
            vec![format!("Ingesting {}", plural(*total, "photo"))]
        }
        IngestEvent::Processed { id, source } => vec![
            format!("{}{}: processed", indent(1), id),
            format!("{}Source: {}", indent(2), source),
        ],
        IngestEvent::Skipped { id } => {
            vec![format!("{}{}: already processed", indent(1), id)]
        }
        IngestEvent::Failed { id, source, error } => vec![
            format!("{}{}: FAILED", indent(1), id),
            format!("{}Source: {}", indent(2), source),
            format!("{}Error: {}", indent(2), error),
        ],
    }
}

/// One-line totals, followed by a recap of failures so they are not lost in
/// the live output.
pub fn format_ingest_summary(report: &IngestReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Ingest: {} processed, {} skipped, {} failed",
        report.processed(),
        report.skipped(),
        report.failed()
    )];
    for outcome in report.failures() {
        if let PhotoOutcome::Failed { id, error, .. } = outcome {
            lines.push(format!("{}{}: {}", indent(1), id, error));
        }
    }
    lines
}

// ============================================================================
// Publish output
// ============================================================================

pub fn format_publish_output(report: &PublishReport) -> Vec<String> {
    report
        .synced
        .iter()
        .map(|tree| format!("{} \u{2192} {}", tree.local.display(), tree.remote))
        .collect()
}

// ============================================================================
// Index output
// ============================================================================

/// Format the rendered index: one line per entry in page order, then where
/// it was written.
pub fn format_index_output(entries: &[GalleryIndexEntry], output: &Path) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(pos, entry)| {
            format!(
                "{} {} {}",
                format_index(pos + 1),
                entry.taken.format("%Y-%m-%d %H:%M"),
                entry.id
            )
        })
        .collect();
    lines.push(format!(
        "Wrote {} \u{2192} {}",
        plural(entries.len(), "photo"),
        output.display()
    ));
    lines
}

/// Format the final line of a build with the count of entries indexed.
pub fn format_build_complete(indexed: usize, output: &Path) -> String {
    format!(
        "==> Build complete: {} \u{2192} {}",
        plural(indexed, "photo"),
        output.display()
    )
}
