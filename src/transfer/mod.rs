mod download;
mod retry;
mod stats;

pub use download::{Downloader, PART_SUFFIX, TransferOptions, TransferTask, part_path};
pub use retry::RetryPolicy;
pub use stats::{TransferOutcome, TransferStats};
