// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Final result of one transfer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was fetched and moved into place
    Downloaded {
        bytes: u64,
        /// Writing stopped at the configured size cap
        truncated: bool,
    },
    /// Dry run: nothing was fetched, counted as downloaded
    DryRun,
    /// The file already existed locally
    Skipped,
    /// Every attempt failed
    Failed { error: String },
}

impl TransferOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Counters for the scrape phase of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Pages that stayed unreachable after every attempt; not part of `total`
    pub pages_failed: usize,
}

impl TransferStats {
    /// Count one finished transfer
    pub fn record(&mut self, outcome: &TransferOutcome) {
        self.total += 1;
        match outcome {
            TransferOutcome::Downloaded { .. } | TransferOutcome::DryRun => self.downloaded += 1,
            TransferOutcome::Skipped => self.skipped += 1,
            TransferOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Count a listing or book page that could not be fetched
    pub fn record_page_failure(&mut self) {
        self.pages_failed += 1;
    }
}
