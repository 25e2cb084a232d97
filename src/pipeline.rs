//! Full build: ingest → publish → index → render.
//!
//! Each stage runs only after the previous one has returned, so publishing
//! sees every record and thumbnail ingest wrote, and a failed publish never
//! produces a page pointing at objects that did not make it to the bucket.
//! The first fatal error stops the run; [`BuildError`] says which stage it
//! came from.

use crate::config::PipelineConfig;
use crate::generate::{self, RenderError};
use crate::imaging::ImageBackend;
use crate::index::{self, IndexError};
use crate::metadata::MetadataExtractor;
use crate::process::{self, IngestConfig, IngestEvent, IngestReport, ProcessError};
use crate::publish::{self, PublishError, PublishReport, SyncTransport};
use crate::scan::{self, ScanError, ScanResult};
use crate::store::RecordStore;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Ingest failed: {0}")]
    Ingest(#[from] ProcessError),
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("Index failed: {0}")]
    Index(#[from] IndexError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

/// The external collaborators a build needs.
pub struct Collaborators<'a, E, B, T> {
    pub extractor: &'a E,
    pub backend: &'a B,
    pub transport: &'a T,
}

/// What a completed build did.
#[derive(Debug)]
pub struct BuildSummary {
    pub scan: ScanResult,
    pub ingest: IngestReport,
    pub publish: PublishReport,
    /// Number of entries on the rendered page.
    pub indexed: usize,
    pub output: PathBuf,
}

/// Discover photos and ingest the new ones.
pub fn ingest(
    config: &PipelineConfig,
    extractor: &impl MetadataExtractor,
    backend: &impl ImageBackend,
    events: Option<Sender<IngestEvent>>,
) -> Result<(ScanResult, IngestReport), BuildError> {
    let scanned = scan::scan(&config.paths.photos, &config.scan.extensions)?;
    let store = RecordStore::new(&config.paths.info);
    let report = process::ingest(
        &scanned.photos,
        &store,
        extractor,
        backend,
        &IngestConfig::from_pipeline_config(config),
        events,
    )?;
    Ok((scanned, report))
}

/// Aggregate all records and write the HTML index. Returns the entry count
/// and the output path.
pub fn render(config: &PipelineConfig) -> Result<(usize, PathBuf), BuildError> {
    let store = RecordStore::new(&config.paths.info);
    let entries = index::build_index(&store)?;
    let output = generate::generate(&entries, config)?;
    Ok((entries.len(), output))
}

/// Run every stage in order.
pub fn run<E, B, T>(
    config: &PipelineConfig,
    collaborators: Collaborators<'_, E, B, T>,
    events: Option<Sender<IngestEvent>>,
) -> Result<BuildSummary, BuildError>
where
    E: MetadataExtractor,
    B: ImageBackend,
    T: SyncTransport,
{
    let (scanned, report) = ingest(
        config,
        collaborators.extractor,
        collaborators.backend,
        events,
    )?;
    tracing::info!(
        processed = report.processed(),
        skipped = report.skipped(),
        failed = report.failed(),
        "ingest finished"
    );

    let published = publish::publish(collaborators.transport, config)?;
    let (indexed, output) = render(config)?;

    Ok(BuildSummary {
        scan: scanned,
        ingest: report,
        publish: published,
        indexed,
        output,
    })
}
