// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use scraper::Selector;
use url::Url;

use crate::catalog::{CatalogItem, Chapter, ContentType, assign_end_times};
use crate::error::ParseError;
use crate::transfer::TransferTask;

use super::link::{clean_filename, parse_time_fragment, resolve_link};
use super::{Extracted, RawLink, SkippedEntry, archive_path, select_links, take_limit};

const BOOK_PAGE_PREFIX: &str = "audio-";
const BOOK_PAGE_SUFFIX: &str = ".html";

static BOOK_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href^="audio-"]"#).expect("valid audiobook selector")
});

static CHAPTER_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[data-url]").expect("valid chapter selector"));

/// A book found on the audiobook listing page
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BookLink {
    pub title: String,
    pub url: Url,
}

/// The catalog entry built from one book page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPage {
    pub entry: Extracted,
    /// Chapters left out, e.g. because of a malformed time fragment
    pub skipped: Vec<SkippedEntry>,
}

/// Find the books on the audiobook listing page
///
/// The same book may be linked several times; duplicates are dropped and the
/// books are ordered by title so ids and order are reproducible.
pub fn parse_book_links(html: &str, page_url: &Url, limit: usize) -> Vec<BookLink> {
    let unique: BTreeSet<BookLink> = select_links(html, &BOOK_LINKS, "href")
        .into_iter()
        .filter(|link| link.target.ends_with(BOOK_PAGE_SUFFIX))
        .filter_map(|link| {
            let url = resolve_link(page_url, &link.target).ok()?;
            Some(BookLink {
                title: link.text,
                url,
            })
        })
        .collect();

    take_limit(unique.into_iter().collect(), limit)
}

/// Book id from its page URL: `.../audio-spiritual-gems.html` is `spiritual-gems`
pub fn book_id(url: &Url) -> String {
    let page = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let page = page.strip_suffix(BOOK_PAGE_SUFFIX).unwrap_or(page);
    page.strip_prefix(BOOK_PAGE_PREFIX).unwrap_or(page).to_string()
}

/// Build the catalog entry for one book from its page
///
/// Chapters follow link order. Each chapter starts at its link's `#t=` offset
/// and ends where the next chapter of the same file starts. Every distinct
/// audio file is transferred once.
pub fn extract_book(book: &BookLink, html: &str, output_dir: &Path) -> BookPage {
    let book_id = book_id(&book.url);
    let links = select_links(html, &CHAPTER_LINKS, "data-url");

    let mut chapters = Vec::new();
    let mut tasks: Vec<TransferTask> = Vec::new();
    let mut skipped = Vec::new();

    for (index, link) in links.iter().enumerate() {
        let title = if link.text.is_empty() {
            format!("Chapter {}", index + 1)
        } else {
            link.text.clone()
        };

        let track_number = chapters.len() as u32 + 1;
        match chapter_entry(&book_id, track_number, &title, link, &book.url, output_dir) {
            Ok((chapter, task)) => {
                if !tasks.iter().any(|t| t.local_path == task.local_path) {
                    tasks.push(task);
                }
                chapters.push(chapter);
            }
            Err(error) => skipped.push(SkippedEntry { title, error }),
        }
    }

    let mut item = CatalogItem::new(book_id, book.title.clone(), ContentType::Audiobook);
    item.source_url = Some(book.url.to_string());
    item.chapters = Some(assign_end_times(chapters));

    BookPage {
        entry: Extracted { item, tasks },
        skipped,
    }
}

fn chapter_entry(
    book_id: &str,
    track_number: u32,
    title: &str,
    link: &RawLink,
    book_url: &Url,
    output_dir: &Path,
) -> Result<(Chapter, TransferTask), ParseError> {
    let start_time = parse_time_fragment(&link.target)?;
    let filename = clean_filename(&link.target)?;
    let mut remote_url = resolve_link(book_url, &link.target)?;
    remote_url.set_fragment(None);

    let stream_url = format!("audio/audiobooks/{book_id}/{filename}");

    let chapter = Chapter {
        id: format!("{book_id}-{track_number:02}"),
        title: title.to_string(),
        track_number,
        stream_url: stream_url.clone(),
        start_time,
        end_time: None,
    };
    let task = TransferTask::new(remote_url.to_string(), archive_path(output_dir, &stream_url));

    Ok((chapter, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<nav>
        <a href="audio-spiritual-gems.html">Spiritual Gems</a>
        <a href="audio-die-to-live.html">Die to Live</a>
        <a href="audio-spiritual-gems.html">Spiritual Gems</a>
        <a href="audio-files.zip">Download all</a>
        <a href="books.html">Books</a>
        <a href="audio-quest-for-light.html">Quest for Light</a>
    </nav>"#;

    const BOOK: &str = r#"<ol>
        <li><a data-url="audio/books/gems/gems-1.mp3#t=0">Foreword</a></li>
        <li><a data-url="audio/books/gems/gems-1.mp3#t=4:05">The Master</a></li>
        <li><a data-url="audio/books/gems/gems-1.mp3#t=1:02:03.5"></a></li>
        <li><a data-url="audio/books/gems/gems-2.mp3">Letters</a></li>
        <li><a data-url="audio/books/gems/gems-2.mp3#t=30:00">Closing</a></li>
    </ol>"#;

    fn listing_url() -> Url {
        Url::parse("https://rssb.org/audiobooks.html").unwrap()
    }

    fn gems() -> BookLink {
        BookLink {
            title: "Spiritual Gems".to_string(),
            url: Url::parse("https://rssb.org/audio-spiritual-gems.html").unwrap(),
        }
    }

    #[test]
    fn book_links_are_deduplicated_and_sorted_by_title() {
        let books = parse_book_links(LISTING, &listing_url(), 0);

        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Die to Live", "Quest for Light", "Spiritual Gems"]);
        assert_eq!(
            books[2].url.as_str(),
            "https://rssb.org/audio-spiritual-gems.html"
        );
    }

    #[test]
    fn limit_applies_after_sorting() {
        let books = parse_book_links(LISTING, &listing_url(), 1);
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Die to Live");
    }

    #[test]
    fn book_id_strips_prefix_and_suffix() {
        assert_eq!(book_id(&gems().url), "spiritual-gems");
        assert_eq!(
            book_id(&Url::parse("https://rssb.org/books/audio-x.html").unwrap()),
            "x"
        );
    }

    #[test]
    fn chapters_carry_ids_titles_and_start_times() {
        let page = extract_book(&gems(), BOOK, Path::new("downloads"));
        let item = &page.entry.item;
        let chapters = item.chapters.as_ref().unwrap();

        assert_eq!(item.id, "spiritual-gems");
        assert_eq!(item.content_type, ContentType::Audiobook);
        assert_eq!(
            item.source_url.as_deref(),
            Some("https://rssb.org/audio-spiritual-gems.html")
        );

        let ids: Vec<_> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "spiritual-gems-01",
                "spiritual-gems-02",
                "spiritual-gems-03",
                "spiritual-gems-04",
                "spiritual-gems-05"
            ]
        );

        assert_eq!(chapters[2].title, "Chapter 3");
        let starts: Vec<_> = chapters.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0, 245, 3723, 0, 1800]);
        assert_eq!(
            chapters[0].stream_url,
            "audio/audiobooks/spiritual-gems/gems-1.mp3"
        );
    }

    #[test]
    fn end_times_follow_each_file() {
        let page = extract_book(&gems(), BOOK, Path::new("downloads"));
        let chapters = page.entry.item.chapters.unwrap();

        let ends: Vec<_> = chapters.iter().map(|c| c.end_time).collect();
        assert_eq!(ends, vec![Some(245), Some(3723), None, Some(1800), None]);
    }

    #[test]
    fn each_audio_file_is_transferred_once() {
        let page = extract_book(&gems(), BOOK, Path::new("downloads"));

        assert_eq!(
            page.entry.tasks,
            vec![
                TransferTask::new(
                    "https://rssb.org/audio/books/gems/gems-1.mp3",
                    Path::new("downloads")
                        .join("audio")
                        .join("audiobooks")
                        .join("spiritual-gems")
                        .join("gems-1.mp3"),
                ),
                TransferTask::new(
                    "https://rssb.org/audio/books/gems/gems-2.mp3",
                    Path::new("downloads")
                        .join("audio")
                        .join("audiobooks")
                        .join("spiritual-gems")
                        .join("gems-2.mp3"),
                ),
            ]
        );
    }

    #[test]
    fn malformed_fragment_skips_only_that_chapter() {
        let html = r#"
            <a data-url="audio/b.mp3#t=0">One</a>
            <a data-url="audio/b.mp3#t=ten">Broken</a>
            <a data-url="audio/b.mp3#t=90">Three</a>
        "#;

        let page = extract_book(&gems(), html, Path::new("downloads"));
        let chapters = page.entry.item.chapters.unwrap();

        assert_eq!(page.skipped.len(), 1);
        assert_eq!(page.skipped[0].title, "Broken");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].track_number, 2);
        assert_eq!(chapters[1].title, "Three");
        assert_eq!(chapters[0].end_time, Some(90));
    }

    #[test]
    fn book_without_chapters_has_empty_list() {
        let page = extract_book(&gems(), "<p>coming soon</p>", Path::new("downloads"));

        assert_eq!(page.entry.item.chapters, Some(vec![]));
        assert!(page.entry.tasks.is_empty());
    }
}
