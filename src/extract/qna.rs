// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::sync::LazyLock;

use scraper::Selector;
use url::Url;

use crate::catalog::{CatalogItem, ContentType};
use crate::error::ParseError;
use crate::transfer::TransferTask;

use super::link::resolve_link;
use super::{Extracted, Extraction, RawLink, archive_path, select_links, take_limit};

static SESSION_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[data-url]").expect("valid session selector"));

/// Extract Q&A sessions from the Q&A listing page
///
/// Sessions are numbered by page order. Source file names are not kept:
/// every session is stored as `audio/qna/{seq:03}.mp3`.
pub fn extract_sessions(html: &str, page_url: &Url, output_dir: &Path, limit: usize) -> Extraction {
    let links = take_limit(select_links(html, &SESSION_LINKS, "data-url"), limit);

    let mut extraction = Extraction::default();
    for (index, link) in links.iter().enumerate() {
        let seq = index + 1;
        let title = format!("Q&A Session {seq}");
        let result = session_entry(seq, &title, link, page_url, output_dir);
        extraction.push(title, result);
    }
    extraction
}

fn session_entry(
    seq: usize,
    title: &str,
    link: &RawLink,
    page_url: &Url,
    output_dir: &Path,
) -> Result<Extracted, ParseError> {
    let remote_url = resolve_link(page_url, &link.target)?;
    let stream_url = format!("audio/qna/{seq:03}.mp3");

    let mut item = CatalogItem::new(format!("qna-{seq:03}"), title, ContentType::Qna);
    item.track_number = Some(seq as u32);
    item.stream_url = Some(stream_url.clone());

    Ok(Extracted {
        item,
        tasks: vec![TransferTask::new(
            remote_url.to_string(),
            archive_path(output_dir, &stream_url),
        )],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1>Questions and Answers</h1>
        <ul>
          <li><a data-url="audio/qna/1961-03-12%20Dera.mp3">12 March 1961</a></li>
          <li><a data-url="audio/qna/1962-01-05%20Delhi.mp3">5 January 1962</a></li>
          <li><a href="index.html">Home</a></li>
          <li><a data-url="https://cdn.rssb.org/qna/1963.mp3">1963</a></li>
        </ul>
    </body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://rssb.org/QandA.html").unwrap()
    }

    #[test]
    fn first_session_is_renumbered() {
        let extraction = extract_sessions(PAGE, &page_url(), Path::new("downloads"), 0);
        let first = &extraction.entries[0];

        assert_eq!(first.item.id, "qna-001");
        assert_eq!(first.item.title, "Q&A Session 1");
        assert_eq!(first.item.content_type, ContentType::Qna);
        assert_eq!(first.item.track_number, Some(1));
        assert_eq!(first.item.stream_url.as_deref(), Some("audio/qna/001.mp3"));
        assert_eq!(
            first.tasks,
            vec![TransferTask::new(
                "https://rssb.org/audio/qna/1961-03-12%20Dera.mp3",
                Path::new("downloads").join("audio").join("qna").join("001.mp3"),
            )]
        );
    }

    #[test]
    fn keeps_page_order_and_absolute_links() {
        let extraction = extract_sessions(PAGE, &page_url(), Path::new("downloads"), 0);

        let ids: Vec<_> = extraction.entries.iter().map(|e| e.item.id.as_str()).collect();
        assert_eq!(ids, vec!["qna-001", "qna-002", "qna-003"]);
        assert_eq!(
            extraction.entries[2].tasks[0].remote_url,
            "https://cdn.rssb.org/qna/1963.mp3"
        );
    }

    #[test]
    fn limit_applies_to_sessions() {
        let extraction = extract_sessions(PAGE, &page_url(), Path::new("downloads"), 2);
        assert_eq!(extraction.entries.len(), 2);
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let first = extract_sessions(PAGE, &page_url(), Path::new("downloads"), 0);
        let second = extract_sessions(PAGE, &page_url(), Path::new("downloads"), 0);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_page_yields_nothing() {
        let extraction = extract_sessions("<html></html>", &page_url(), Path::new("d"), 0);
        assert!(extraction.entries.is_empty());
        assert!(extraction.skipped.is_empty());
    }
}
