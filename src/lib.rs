//! # photoshelf
//!
//! An incremental photo-gallery publisher. Drop photos into dated
//! directories, run `photoshelf`, and get a bucket-hosted gallery with a
//! single HTML index ordered newest first.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Ingest    photos/          →  info/ + thumbnails/   (metadata + previews, new photos only)
//! 2. Publish   photos/, thumbs  →  gs://<bucket>/…       (mirror both trees)
//! 3. Index     info/            →  entries, newest first
//! 4. Render    entries          →  docs/index.html
//! ```
//!
//! Stages run strictly in order and the first fatal error stops the run, so
//! a failed publish never yields a page that links to missing objects.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Discovers source photos and their collection keys |
//! | [`process`] | Stage 1: incremental ingest, gated on record existence |
//! | [`metadata`] | External EXIF tool adapter and tag → field mapping |
//! | [`imaging`] | Bounded thumbnails through the `image` crate |
//! | [`store`] | Write-once TOML metadata records |
//! | [`publish`] | Stage 2: mirrors local trees to the bucket |
//! | [`index`] | Stage 3: loads records and orders them by capture time |
//! | [`generate`] | Stage 4: renders the HTML index with Maud |
//! | [`pipeline`] | Runs the stages in order |
//! | [`config`] | `photoshelf.toml` loading, merging, and validation |
//! | [`types`] | `SourcePhoto` and `RecordId`, shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Record Is the Gate
//!
//! A photo counts as processed exactly when its metadata record exists. The
//! record is written last, atomically and only if absent, so re-running after
//! a crash or a failure redoes just the photos that never completed, and
//! existing records and thumbnails are never rewritten.
//!
//! ## Collaborators Behind Traits
//!
//! The EXIF tool ([`metadata::MetadataExtractor`]), image codec
//! ([`imaging::ImageBackend`]) and sync program ([`publish::SyncTransport`])
//! are traits. Production code shells out or uses the `image` crate; tests
//! substitute recording mocks and assert on what was (or was not) called.
//!
//! ## One Config Value
//!
//! Every path, prefix, and tool invocation comes from a single
//! [`config::PipelineConfig`] built at startup and passed down. Nothing reads
//! process-wide state once the run has begun.

pub mod config;
pub mod generate;
pub mod imaging;
pub mod index;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod scan;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
