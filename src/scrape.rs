// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::{CatalogItem, write_catalog};
use crate::error::FetchError;
use crate::extract::{
    Category, Extracted, Extraction, SkippedEntry, extract_book, extract_discourses,
    extract_sessions, extract_shabads, parse_book_links,
};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::transfer::{Downloader, RetryPolicy, TransferOptions, TransferStats};

/// Default origin site
pub const DEFAULT_BASE_URL: &str = "https://rssb.org";

/// Options for the scrape phase
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Site root the listing pages are resolved against
    pub base_url: Url,
    /// Root of the local archive
    pub output_dir: PathBuf,
    /// Maximum number of items per category (0 = all)
    pub limit: usize,
    pub transfer: TransferOptions,
    pub retry: RetryPolicy,
    /// Pause between two audiobook page fetches
    pub book_delay: Duration,
}

impl ScrapeOptions {
    pub fn new(base_url: Url, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            output_dir: output_dir.into(),
            limit: 0,
            transfer: TransferOptions::default(),
            retry: RetryPolicy::default(),
            book_delay: Duration::from_millis(500),
        }
    }
}

/// Mirror every category into `options.output_dir` and write its catalog
///
/// Categories, items and files are processed one at a time. Nothing in here
/// aborts the run. Pages are retried like downloads; a page that stays
/// unreachable is counted in `stats` and contributes no entries. A failed
/// download is counted too, and a catalog that cannot be written is reported.
pub async fn scrape_all<C: HttpClient>(
    client: &C,
    options: &ScrapeOptions,
    reporter: SharedProgressReporter,
    stats: &mut TransferStats,
) {
    let downloader = Downloader::new(client, options.transfer, options.retry, reporter.clone());

    for category in Category::ALL {
        reporter.report(ProgressEvent::CategoryStarted { category });

        let entries = extract_category(client, category, options, &reporter, stats).await;
        reporter.report(ProgressEvent::ItemsFound {
            category,
            count: entries.len(),
        });

        let items = transfer_entries(&downloader, category, entries, &reporter, stats).await;

        let path = options.output_dir.join(category.catalog_path());
        match write_catalog(&items, &path) {
            Ok(()) => {
                info!(%category, path = %path.display(), items = items.len(), "catalog written");
                reporter.report(ProgressEvent::CatalogWritten {
                    category,
                    path,
                    items: items.len(),
                });
            }
            Err(e) => {
                warn!(%category, error = %e, "failed to write catalog");
                reporter.report(ProgressEvent::CatalogFailed {
                    category,
                    error: e.to_string(),
                });
            }
        }
    }

    reporter.report(ProgressEvent::ScrapeCompleted { stats: *stats });
}

/// Fetch a category's listing page and run its extractor
///
/// An unreachable listing page gives no entries.
async fn extract_category<C: HttpClient>(
    client: &C,
    category: Category,
    options: &ScrapeOptions,
    reporter: &SharedProgressReporter,
    stats: &mut TransferStats,
) -> Vec<Extracted> {
    let fetched = match page_url(&options.base_url, category.listing_page()) {
        Ok(url) => fetch_page_retrying(client, &url, options.retry)
            .await
            .map(|html| (url, html)),
        Err(e) => Err(e),
    };
    let (page_url, html) = match fetched {
        Ok(page) => page,
        Err(e) => {
            warn!(%category, error = %e, "listing page unavailable, catalog will be empty");
            stats.record_page_failure();
            reporter.report(ProgressEvent::PageFetchFailed {
                url: category.listing_page().to_string(),
                error: e.to_string(),
            });
            return Vec::new();
        }
    };

    let output_dir = options.output_dir.as_path();
    let limit = options.limit;
    let extraction = match category {
        Category::Audiobooks => {
            return extract_audiobooks(client, &html, &page_url, options, reporter, stats).await;
        }
        Category::Qna => extract_sessions(&html, &page_url, output_dir, limit),
        Category::Shabads => extract_shabads(&html, &page_url, output_dir, limit),
        Category::Discourses => extract_discourses(&html, &page_url, output_dir, limit),
    };

    let Extraction { entries, skipped } = extraction;
    report_skipped(&skipped, reporter);
    entries
}

/// Fetch every book page linked from the audiobook listing
async fn extract_audiobooks<C: HttpClient>(
    client: &C,
    listing_html: &str,
    listing_url: &Url,
    options: &ScrapeOptions,
    reporter: &SharedProgressReporter,
    stats: &mut TransferStats,
) -> Vec<Extracted> {
    let books = parse_book_links(listing_html, listing_url, options.limit);
    debug!(count = books.len(), "audiobooks listed");

    let mut entries = Vec::with_capacity(books.len());
    for (index, book) in books.iter().enumerate() {
        if index > 0 && !options.book_delay.is_zero() {
            tokio::time::sleep(options.book_delay).await;
        }

        let html = match fetch_page_retrying(client, &book.url, options.retry).await {
            Ok(html) => html,
            Err(e) => {
                warn!(book = %book.title, error = %e, "skipping audiobook");
                stats.record_page_failure();
                reporter.report(ProgressEvent::PageFetchFailed {
                    url: book.url.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let page = extract_book(book, &html, &options.output_dir);
        report_skipped(&page.skipped, reporter);
        entries.push(page.entry);
    }
    entries
}

/// Download every file an entry needs, in order, and keep the catalog items
async fn transfer_entries<C: HttpClient>(
    downloader: &Downloader<'_, C>,
    category: Category,
    entries: Vec<Extracted>,
    reporter: &SharedProgressReporter,
    stats: &mut TransferStats,
) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(entries.len());

    for Extracted { item, tasks } in entries {
        if !seen.insert(item.id.clone()) {
            warn!(%category, id = %item.id, "duplicate id in catalog");
            reporter.report(ProgressEvent::DuplicateId {
                category,
                id: item.id.clone(),
            });
        }

        for task in &tasks {
            downloader.fetch(task, stats).await;
        }
        items.push(item);
    }
    items
}

fn report_skipped(skipped: &[SkippedEntry], reporter: &SharedProgressReporter) {
    for entry in skipped {
        warn!(title = %entry.title, error = %entry.error, "skipping entry");
        reporter.report(ProgressEvent::ItemSkipped {
            title: entry.title.clone(),
            reason: entry.error.to_string(),
        });
    }
}

/// Resolve a page against the site root, treating the root as a directory
fn page_url(base: &Url, page: &str) -> Result<Url, FetchError> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    Ok(root.join(page)?)
}

/// Fetch a page under the retry policy, warning on each failed attempt
async fn fetch_page_retrying<C: HttpClient>(
    client: &C,
    url: &Url,
    retry: RetryPolicy,
) -> Result<String, FetchError> {
    retry
        .run(
            |_| fetch_page(client, url),
            |attempt, e| warn!(%url, attempt, error = %e, "page fetch failed, retrying"),
        )
        .await
}

/// Fetch a page as text. Invalid UTF-8 is replaced.
async fn fetch_page<C: HttpClient>(client: &C, url: &Url) -> Result<String, FetchError> {
    debug!(%url, "fetching page");
    let bytes = client
        .get_bytes(url.as_str())
        .await
        .map_err(|e| FetchError::RequestFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
