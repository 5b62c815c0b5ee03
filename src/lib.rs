// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod catalog;
pub mod error;
pub mod extract;
pub mod http;
pub mod progress;
pub mod scrape;
pub mod transfer;
pub mod upload;

// Re-export main types for convenience
pub use catalog::{CatalogItem, Chapter, ContentType, assign_end_times, write_catalog};
pub use error::{
    CatalogError, CredentialError, FetchError, HttpError, ParseError, StorageError, SyncError,
    TransferError,
};
pub use extract::{Category, clean_filename, parse_time_fragment};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use scrape::{DEFAULT_BASE_URL, ScrapeOptions, scrape_all};
pub use transfer::{
    Downloader, RetryPolicy, TransferOptions, TransferOutcome, TransferStats, TransferTask,
};
pub use upload::{
    DEFAULT_BUCKET, ObjectStore, S3Store, StorageConfig, SyncOptions, SyncStats, UploadDecision,
    sync_tree,
};
