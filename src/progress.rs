// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use crate::extract::Category;
use crate::transfer::{TransferOutcome, TransferStats};
use crate::upload::{SyncStats, UploadDecision};

/// Events emitted while scraping and syncing, for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A category's listing page is about to be fetched
    CategoryStarted { category: Category },

    /// A listing or book page could not be fetched
    PageFetchFailed { url: String, error: String },

    /// A listing page was parsed
    ItemsFound { category: Category, count: usize },

    /// An item or chapter was left out of the catalog
    ItemSkipped { title: String, reason: String },

    /// Two entries of one catalog share an id
    DuplicateId { category: Category, id: String },

    /// A download is starting
    TransferStarting {
        url: String,
        path: PathBuf,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    TransferProgress {
        path: PathBuf,
        bytes_written: u64,
        total_bytes: Option<u64>,
    },

    /// A download attempt failed and will be repeated
    TransferRetrying {
        url: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// A download finished with its final outcome
    TransferFinished {
        url: String,
        path: PathBuf,
        outcome: TransferOutcome,
    },

    /// A catalog document was written
    CatalogWritten {
        category: Category,
        path: PathBuf,
        items: usize,
    },

    /// A catalog document could not be written
    CatalogFailed { category: Category, error: String },

    /// The scrape phase finished
    ScrapeCompleted { stats: TransferStats },

    /// The upload phase is starting
    SyncStarting {
        source: PathBuf,
        bucket: String,
        dry_run: bool,
        /// False when running without credentials, so remote state is unknown
        remote_checks: bool,
    },

    /// The sync engine decided what to do with one file
    UploadDecided {
        key: String,
        decision: UploadDecision,
        dry_run: bool,
    },

    /// An upload attempt failed and will be repeated
    UploadRetrying {
        key: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// A file was written to object storage
    UploadCompleted { key: String, bytes: u64 },

    /// A file could not be checked or uploaded
    UploadFailed { key: String, error: String },

    /// The upload phase finished
    SyncCompleted { stats: SyncStats },
}

/// Trait for reporting progress events.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Reporter that keeps every event, for assertions in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub events: std::sync::Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
