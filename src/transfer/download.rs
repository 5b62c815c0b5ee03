// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::TransferError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::retry::RetryPolicy;
use super::stats::{TransferOutcome, TransferStats};

/// Suffix of the file a download is streamed into before it is complete
pub const PART_SUFFIX: &str = ".part";

/// One file to pull from the origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub remote_url: String,
    pub local_path: PathBuf,
}

impl TransferTask {
    pub fn new(remote_url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_path: local_path.into(),
        }
    }
}

/// Options shared by every transfer of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Report downloads without touching the network or the disk
    pub dry_run: bool,
    /// Stop writing after this many bytes (0 = unlimited)
    pub max_size: u64,
}

/// Idempotent, retrying file fetcher
///
/// A file that already exists is never fetched again. Data is streamed into
/// a `.part` sibling which is renamed onto the final path only once complete,
/// so the final path never holds a partial download.
pub struct Downloader<'a, C: HttpClient> {
    client: &'a C,
    options: TransferOptions,
    retry: RetryPolicy,
    reporter: SharedProgressReporter,
}

impl<'a, C: HttpClient> Downloader<'a, C> {
    pub fn new(
        client: &'a C,
        options: TransferOptions,
        retry: RetryPolicy,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            client,
            options,
            retry,
            reporter,
        }
    }

    /// Fetch one file and count the outcome in `stats`
    pub async fn fetch(&self, task: &TransferTask, stats: &mut TransferStats) -> TransferOutcome {
        let outcome = self.run_task(task).await;
        stats.record(&outcome);

        self.reporter.report(ProgressEvent::TransferFinished {
            url: task.remote_url.clone(),
            path: task.local_path.clone(),
            outcome: outcome.clone(),
        });

        outcome
    }

    async fn run_task(&self, task: &TransferTask) -> TransferOutcome {
        if self.options.dry_run {
            debug!(url = %task.remote_url, path = %task.local_path.display(), "dry run, not downloading");
            return TransferOutcome::DryRun;
        }

        if task.local_path.exists() {
            debug!(path = %task.local_path.display(), "already present");
            return TransferOutcome::Skipped;
        }

        let part_path = part_path(&task.local_path);
        let max_attempts = self.retry.max_attempts;

        let result = self
            .retry
            .run(
                |_| self.attempt(task, &part_path),
                |attempt, error| {
                    warn!(url = %task.remote_url, attempt, %error, "download attempt failed");
                    self.reporter.report(ProgressEvent::TransferRetrying {
                        url: task.remote_url.clone(),
                        attempt,
                        max_attempts,
                        error: error.to_string(),
                    });
                },
            )
            .await;

        match result {
            Ok((bytes, truncated)) => TransferOutcome::Downloaded { bytes, truncated },
            Err(e) => {
                warn!(url = %task.remote_url, error = %e, "giving up on download");
                TransferOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// One attempt: stream into the `.part` file, then rename it into place.
    /// The `.part` file is removed whenever the attempt fails.
    async fn attempt(
        &self,
        task: &TransferTask,
        part_path: &Path,
    ) -> Result<(u64, bool), TransferError> {
        let written = match self.stream_to_file(task, part_path).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(part_path, &task.local_path).await {
            let _ = tokio::fs::remove_file(part_path).await;
            return Err(TransferError::RenameFailed {
                from: part_path.to_path_buf(),
                source: e,
            });
        }

        Ok(written)
    }

    /// Stream the response body to `output_path`, honoring the size cap.
    /// Returns the number of bytes written and whether the cap was reached.
    async fn stream_to_file(
        &self,
        task: &TransferTask,
        output_path: &Path,
    ) -> Result<(u64, bool), TransferError> {
        let url = task.remote_url.as_str();

        if let Some(parent) = task.local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransferError::CreateDirectoryFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }

        let response = self
            .client
            .get_stream(url)
            .await
            .map_err(|e| TransferError::HttpFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(TransferError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        self.reporter.report(ProgressEvent::TransferStarting {
            url: url.to_string(),
            path: task.local_path.clone(),
            content_length: response.content_length,
        });

        let mut file =
            File::create(output_path)
                .await
                .map_err(|e| TransferError::FileCreateFailed {
                    path: output_path.to_path_buf(),
                    source: e,
                })?;

        let max_size = self.options.max_size;
        let mut bytes_written: u64 = 0;
        let mut truncated = false;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| TransferError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            let mut data = chunk.as_ref();
            if max_size > 0 {
                let remaining = max_size - bytes_written;
                if data.len() as u64 >= remaining {
                    data = &data[..remaining as usize];
                    truncated = true;
                }
            }

            file.write_all(data)
                .await
                .map_err(|e| TransferError::FileWriteFailed {
                    path: output_path.to_path_buf(),
                    source: e,
                })?;

            bytes_written += data.len() as u64;

            self.reporter.report(ProgressEvent::TransferProgress {
                path: task.local_path.clone(),
                bytes_written,
                total_bytes: response.content_length,
            });

            if truncated {
                debug!(url, bytes_written, "size cap reached");
                break;
            }
        }

        file.flush()
            .await
            .map_err(|e| TransferError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        Ok((bytes_written, truncated))
    }
}

/// The temporary sibling a download is written to: `name.mp3` -> `name.mp3.part`
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::{NoopReporter, RecordingReporter};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// What the mock answers to one `get_stream` call
    #[derive(Clone)]
    enum Reply {
        Body(Vec<&'static str>),
        Status(u16),
        ConnectionRefused,
        /// Some chunks, then a stream error
        BreaksAfter(Vec<&'static str>),
    }

    struct MockHttpClient {
        replies: Mutex<VecDeque<Reply>>,
        fallback: Reply,
        calls: AtomicUsize,
    }

    impl MockHttpClient {
        fn always(reply: Reply) -> Self {
            Self::scripted(vec![], reply)
        }

        fn scripted(replies: Vec<Reply>, fallback: Reply) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn io_error(message: &str) -> HttpError {
        HttpError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            message.to_string(),
        ))
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, HttpError> {
            unreachable!("downloads only stream")
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            let (status, items): (u16, Vec<Result<Bytes, HttpError>>) = match reply {
                Reply::Body(chunks) => (
                    200,
                    chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect(),
                ),
                Reply::Status(status) => (status, vec![]),
                Reply::ConnectionRefused => return Err(io_error("connection refused")),
                Reply::BreaksAfter(chunks) => {
                    let mut items: Vec<_> =
                        chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
                    items.push(Err(io_error("connection reset")));
                    (200, items)
                }
            };

            let body: ByteStream = Box::pin(futures::stream::iter(items));
            Ok(HttpResponse {
                status,
                content_length: None,
                body,
            })
        }
    }

    fn downloader(client: &MockHttpClient, options: TransferOptions) -> Downloader<'_, MockHttpClient> {
        Downloader::new(
            client,
            options,
            RetryPolicy::immediate(3),
            NoopReporter::shared(),
        )
    }

    #[tokio::test]
    async fn download_writes_file_and_cleans_part() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audio").join("qna").join("001.mp3");
        let client = MockHttpClient::always(Reply::Body(vec!["test audio ", "content"]));
        let mut stats = TransferStats::default();

        let outcome = downloader(&client, TransferOptions::default())
            .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
            .await;

        assert_eq!(
            outcome,
            TransferOutcome::Downloaded {
                bytes: 18,
                truncated: false
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"test audio content");
        assert!(!part_path(&path).exists());
        assert_eq!(stats.downloaded, 1);
    }

    #[tokio::test]
    async fn second_fetch_is_skipped_and_content_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::always(Reply::Body(vec!["audio"]));
        let task = TransferTask::new("https://example.com/a.mp3", &path);
        let engine = downloader(&client, TransferOptions::default());
        let mut stats = TransferStats::default();

        let first = engine.fetch(&task, &mut stats).await;
        let content_after_first = std::fs::read(&path).unwrap();
        let second = engine.fetch(&task, &mut stats).await;

        assert!(matches!(first, TransferOutcome::Downloaded { .. }));
        assert_eq!(second, TransferOutcome::Skipped);
        assert_eq!(std::fs::read(&path).unwrap(), content_after_first);
        assert_eq!(client.calls(), 1);
        assert_eq!(
            stats,
            TransferStats {
                total: 2,
                downloaded: 1,
                skipped: 1,
                failed: 0,
                pages_failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("001.mp3");
        let client = MockHttpClient::always(Reply::Body(vec!["audio"]));
        let mut stats = TransferStats::default();

        let outcome = downloader(
            &client,
            TransferOptions {
                dry_run: true,
                max_size: 0,
            },
        )
        .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
        .await;

        assert_eq!(outcome, TransferOutcome::DryRun);
        assert_eq!(client.calls(), 0);
        assert!(!dir.path().join("sub").exists());
        assert_eq!(stats.downloaded, 1);
    }

    #[tokio::test]
    async fn http_error_is_retried_then_counted_failed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::always(Reply::Status(404));
        let reporter = Arc::new(RecordingReporter::default());
        let engine = Downloader::new(
            &client,
            TransferOptions::default(),
            RetryPolicy::immediate(3),
            reporter.clone(),
        );
        let mut stats = TransferStats::default();

        let outcome = engine
            .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
            .await;

        assert!(outcome.is_failed());
        assert_eq!(client.calls(), 3);
        assert!(!path.exists());
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 1);

        let retries = reporter
            .events()
            .into_iter()
            .filter(|e| matches!(e, ProgressEvent::TransferRetrying { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn failure_mid_stream_leaves_no_artifacts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::always(Reply::BreaksAfter(vec!["half of the "]));
        let mut stats = TransferStats::default();

        let outcome = downloader(&client, TransferOptions::default())
            .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
            .await;

        assert!(outcome.is_failed());
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::scripted(
            vec![Reply::ConnectionRefused, Reply::BreaksAfter(vec!["par"])],
            Reply::Body(vec!["complete"]),
        );
        let mut stats = TransferStats::default();

        let outcome = downloader(&client, TransferOptions::default())
            .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
            .await;

        assert!(matches!(outcome, TransferOutcome::Downloaded { bytes: 8, .. }));
        assert_eq!(client.calls(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), b"complete");
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn size_cap_truncates_and_still_finalizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::always(Reply::Body(vec!["0123", "4567", "89"]));
        let mut stats = TransferStats::default();

        let outcome = downloader(
            &client,
            TransferOptions {
                dry_run: false,
                max_size: 6,
            },
        )
        .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
        .await;

        assert_eq!(
            outcome,
            TransferOutcome::Downloaded {
                bytes: 6,
                truncated: true
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"012345");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn size_cap_larger_than_file_is_not_truncation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        let client = MockHttpClient::always(Reply::Body(vec!["tiny"]));
        let mut stats = TransferStats::default();

        let outcome = downloader(
            &client,
            TransferOptions {
                dry_run: false,
                max_size: 1024,
            },
        )
        .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
        .await;

        assert_eq!(
            outcome,
            TransferOutcome::Downloaded {
                bytes: 4,
                truncated: false
            }
        );
    }

    #[tokio::test]
    async fn stale_part_file_does_not_count_as_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        std::fs::write(part_path(&path), b"stale").unwrap();
        let client = MockHttpClient::always(Reply::Body(vec!["fresh"]));
        let mut stats = TransferStats::default();

        let outcome = downloader(&client, TransferOptions::default())
            .fetch(&TransferTask::new("https://example.com/a.mp3", &path), &mut stats)
            .await;

        assert!(matches!(outcome, TransferOutcome::Downloaded { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("audio/qna/001.mp3")),
            PathBuf::from("audio/qna/001.mp3.part")
        );
    }
}
