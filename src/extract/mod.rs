// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning fetched listing pages into catalog entries.
//!
//! Every extractor is a pure function over page HTML: it never touches the
//! network, it only describes the catalog entries and the files they need.

mod audiobooks;
mod discourses;
mod link;
mod qna;
mod shabads;

use std::fmt;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};

use crate::catalog::CatalogItem;
use crate::error::ParseError;
use crate::transfer::TransferTask;

pub use audiobooks::{BookLink, BookPage, book_id, extract_book, parse_book_links};
pub use discourses::extract_discourses;
pub use link::{clean_filename, decoded_filename, parse_time_fragment, resolve_link};
pub use qna::extract_sessions;
pub use shabads::{extract_shabads, split_shabad_name};

/// Content categories mirrored from the origin site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Audiobooks,
    Qna,
    Shabads,
    Discourses,
}

impl Category {
    /// All categories, in the order a run processes them
    pub const ALL: [Category; 4] = [
        Category::Audiobooks,
        Category::Qna,
        Category::Shabads,
        Category::Discourses,
    ];

    /// Listing page, relative to the site root
    pub fn listing_page(self) -> &'static str {
        match self {
            Category::Audiobooks => "audiobooks.html",
            Category::Qna => "QandA.html",
            Category::Shabads => "shabads.html",
            Category::Discourses => "discourses-en.html",
        }
    }

    /// Catalog document, relative to the output directory
    pub fn catalog_path(self) -> &'static str {
        match self {
            Category::Audiobooks => "catalog/audiobooks.json",
            Category::Qna => "catalog/qna.json",
            Category::Shabads => "catalog/shabads.json",
            Category::Discourses => "catalog/discourses.json",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Audiobooks => "audiobooks",
            Category::Qna => "Q&A",
            Category::Shabads => "shabads",
            Category::Discourses => "discourses",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A catalog entry together with the files it refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub item: CatalogItem,
    pub tasks: Vec<TransferTask>,
}

/// A source link that could not become a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub title: String,
    pub error: ParseError,
}

/// Result of running an extractor over one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub entries: Vec<Extracted>,
    pub skipped: Vec<SkippedEntry>,
}

impl Extraction {
    fn push(&mut self, title: String, result: Result<Extracted, ParseError>) {
        match result {
            Ok(entry) => self.entries.push(entry),
            Err(error) => self.skipped.push(SkippedEntry { title, error }),
        }
    }
}

/// The attribute value and trimmed text of one matched `<a>` element
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawLink {
    target: String,
    text: String,
}

/// Collect `attribute` and text of every element matching `selector`, in page order
fn select_links(html: &str, selector: &Selector, attribute: &str) -> Vec<RawLink> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|element| {
            let target = element.value().attr(attribute)?;
            Some(RawLink {
                target: target.to_string(),
                text: element.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

/// Local file for a `/`-delimited archive path such as `audio/qna/001.mp3`
fn archive_path(output_dir: &Path, stream_url: &str) -> PathBuf {
    stream_url
        .split('/')
        .fold(output_dir.to_path_buf(), |path, segment| path.join(segment))
}

/// Keep the first `limit` entries; 0 keeps everything
fn take_limit<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        items.truncate(limit);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static DATA_URL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[data-url]").expect("valid selector"));

    #[test]
    fn select_links_keeps_page_order_and_trims_text() {
        let html = r#"<ul>
            <li><a data-url="b.mp3">  Second?  </a></li>
            <li><a href="x.html">not a track</a></li>
            <li><a data-url="a.mp3"><span>First</span> part</a></li>
        </ul>"#;

        let links = select_links(html, &DATA_URL, "data-url");

        assert_eq!(
            links,
            vec![
                RawLink {
                    target: "b.mp3".to_string(),
                    text: "Second?".to_string()
                },
                RawLink {
                    target: "a.mp3".to_string(),
                    text: "First part".to_string()
                },
            ]
        );
    }

    #[test]
    fn take_limit_zero_means_everything() {
        assert_eq!(take_limit(vec![1, 2, 3], 0), vec![1, 2, 3]);
        assert_eq!(take_limit(vec![1, 2, 3], 2), vec![1, 2]);
        assert_eq!(take_limit(vec![1, 2, 3], 10), vec![1, 2, 3]);
    }

    #[test]
    fn archive_path_follows_stream_url_segments() {
        let path = archive_path(Path::new("downloads"), "audio/qna/001.mp3");
        assert_eq!(
            path,
            Path::new("downloads").join("audio").join("qna").join("001.mp3")
        );
    }

    #[test]
    fn categories_map_to_fixed_pages_and_catalogs() {
        assert_eq!(Category::Qna.listing_page(), "QandA.html");
        assert_eq!(Category::Discourses.catalog_path(), "catalog/discourses.json");
        assert_eq!(Category::ALL.len(), 4);
    }
}
