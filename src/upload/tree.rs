// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CredentialError, StorageError, SyncError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::transfer::RetryPolicy;

use super::content_type::content_type_for;
use super::store::{DEFAULT_BUCKET, ObjectStore};

/// Options for the upload phase
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bucket name, used for reporting
    pub bucket: String,
    /// Decide and report, but never write to the store
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// What the sync engine does with one local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    /// No remote object yet
    New,
    /// The remote object has a different size
    Changed { local: u64, remote: u64 },
    /// Same size on both sides
    Unchanged,
    /// Remote state unknown (dry run without credentials)
    Unchecked,
}

impl UploadDecision {
    pub fn needs_upload(self) -> bool {
        !matches!(self, UploadDecision::Unchanged)
    }
}

/// Counters for the upload phase of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub total: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Object key for a file below `source`: its relative path joined with `/`
pub fn remote_key(source: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(source).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

enum FileOutcome {
    Uploaded,
    Skipped,
}

/// Push every regular file under `source` to `store`
///
/// Files are visited in file-name order and compared by size only: a file
/// whose remote object has the same size is skipped. `store` may be `None`
/// only for a dry run, which then reports every file as a would-be upload.
/// A file that cannot be checked or uploaded is counted failed and the walk
/// continues.
pub async fn sync_tree(
    store: Option<&dyn ObjectStore>,
    source: &Path,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
    stats: &mut SyncStats,
) -> Result<SyncStats, SyncError> {
    if !source.is_dir() {
        return Err(SyncError::SourceNotFound(source.to_path_buf()));
    }
    if store.is_none() && !options.dry_run {
        return Err(CredentialError::Missing("object storage credentials").into());
    }

    info!(source = %source.display(), bucket = %options.bucket, dry_run = options.dry_run, "syncing");
    reporter.report(ProgressEvent::SyncStarting {
        source: source.to_path_buf(),
        bucket: options.bucket.clone(),
        dry_run: options.dry_run,
        remote_checks: store.is_some(),
    });

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let key = e
                    .path()
                    .and_then(|path| remote_key(source, path))
                    .unwrap_or_else(|| source.display().to_string());
                warn!(%key, error = %e, "cannot read directory entry");
                stats.total += 1;
                stats.failed += 1;
                reporter.report(ProgressEvent::UploadFailed {
                    key,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = remote_key(source, entry.path()) else {
            continue;
        };

        stats.total += 1;
        match sync_file(store, entry.path(), &key, options, &reporter).await {
            Ok(FileOutcome::Uploaded) => stats.uploaded += 1,
            Ok(FileOutcome::Skipped) => stats.skipped += 1,
            Err(e) => {
                warn!(%key, error = %e, "sync failed");
                stats.failed += 1;
                reporter.report(ProgressEvent::UploadFailed {
                    key,
                    error: e.to_string(),
                });
            }
        }
    }

    reporter.report(ProgressEvent::SyncCompleted { stats: *stats });
    Ok(*stats)
}

async fn sync_file(
    store: Option<&dyn ObjectStore>,
    path: &Path,
    key: &str,
    options: &SyncOptions,
    reporter: &SharedProgressReporter,
) -> Result<FileOutcome, StorageError> {
    let local = tokio::fs::metadata(path)
        .await
        .map_err(|e| StorageError::LocalReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();

    let decision = match store {
        None => UploadDecision::Unchecked,
        Some(store) => match store.head(key).await? {
            None => UploadDecision::New,
            Some(remote) if remote == local => UploadDecision::Unchanged,
            Some(remote) => UploadDecision::Changed { local, remote },
        },
    };

    debug!(key, ?decision, "decided");
    reporter.report(ProgressEvent::UploadDecided {
        key: key.to_string(),
        decision,
        dry_run: options.dry_run,
    });

    if !decision.needs_upload() {
        return Ok(FileOutcome::Skipped);
    }

    let store = match store {
        Some(store) if !options.dry_run => store,
        _ => return Ok(FileOutcome::Uploaded),
    };

    let content_type = content_type_for(path);
    let max_attempts = options.retry.max_attempts;
    let bytes = options
        .retry
        .run(
            |_| store.put_file(key, path, content_type),
            |attempt, error| {
                warn!(key, attempt, %error, "upload attempt failed");
                reporter.report(ProgressEvent::UploadRetrying {
                    key: key.to_string(),
                    attempt,
                    max_attempts,
                    error: error.to_string(),
                });
            },
        )
        .await?;

    reporter.report(ProgressEvent::UploadCompleted {
        key: key.to_string(),
        bytes,
    });
    Ok(FileOutcome::Uploaded)
}
