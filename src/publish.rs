//! Remote mirroring.
//!
//! Stage 2 of the build. After ingest has finished writing, the local photo
//! and thumbnail trees are mirrored to the bucket:
//!
//! ```text
//! photos/      ──►  gs://<bucket>/<photos_prefix>
//! thumbnails/  ──►  gs://<bucket>/<thumbnails_prefix>
//! ```
//!
//! Originals go first, so a published thumbnail never links to a missing
//! original. The transfer is delegated to an external sync program
//! (`gsutil -m rsync -r -d` by default) through the [`SyncTransport`] trait;
//! tests substitute a recording transport.
//!
//! Any failure aborts the run before the index is rendered.

use crate::config::{PipelineConfig, RemoteConfig};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Local directory to publish not found: {0}")]
    MissingSource(PathBuf),
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Sync of {local} to {remote} failed ({status}): {stderr}")]
    Failed {
        local: PathBuf,
        remote: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Something that can make a remote prefix mirror a local directory.
pub trait SyncTransport: Sync {
    fn mirror(&self, local: &Path, remote: &str) -> Result<(), PublishError>;
}

/// Transport that shells out to the configured sync command.
///
/// Invoked as `<sync_command> <sync_args...> <local> <remote>`.
#[derive(Debug, Clone)]
pub struct CommandTransport {
    command: String,
    args: Vec<String>,
}

impl CommandTransport {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            command: config.sync_command.clone(),
            args: config.sync_args.clone(),
        }
    }
}

impl SyncTransport for CommandTransport {
    fn mirror(&self, local: &Path, remote: &str) -> Result<(), PublishError> {
        tracing::debug!(command = %self.command, local = %local.display(), remote, "syncing");
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(local)
            .arg(remote)
            .output()
            .map_err(|source| PublishError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PublishError::Failed {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `gs://<bucket>/<prefix>`
pub fn remote_url(bucket: &str, prefix: &str) -> String {
    let bucket = bucket.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("gs://{bucket}")
    } else {
        format!("gs://{bucket}/{prefix}")
    }
}

/// One completed mirror operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedTree {
    pub local: PathBuf,
    pub remote: String,
}

/// Trees mirrored by [`publish`], in the order they were synced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub synced: Vec<SyncedTree>,
}

/// Mirror originals, then thumbnails.
///
/// The photo directory is checked before anything is transferred: a missing
/// source tree would otherwise mirror "nothing" over the remote prefix.
pub fn publish(
    transport: &impl SyncTransport,
    config: &PipelineConfig,
) -> Result<PublishReport, PublishError> {
    let plan = [
        (&config.paths.photos, &config.remote.photos_prefix),
        (&config.paths.thumbnails, &config.remote.thumbnails_prefix),
    ];

    // The thumbnail root is created by ingest; only the source tree is checked.
    if !config.paths.photos.is_dir() {
        return Err(PublishError::MissingSource(config.paths.photos.clone()));
    }

    let mut report = PublishReport::default();
    for (local, prefix) in plan {
        let remote = remote_url(&config.remote.bucket, prefix);
        tracing::info!(local = %local.display(), %remote, "publishing");
        transport.mirror(local, &remote)?;
        report.synced.push(SyncedTree {
            local: local.clone(),
            remote,
        });
    }
    Ok(report)
}
