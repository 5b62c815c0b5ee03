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

use super::link::{clean_filename, resolve_link};
use super::{Extracted, Extraction, RawLink, archive_path, select_links, take_limit};

const LANGUAGE: &str = "en";

static DISCOURSE_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[data-url]").expect("valid discourse selector"));

/// Extract English discourses from the discourse listing page
pub fn extract_discourses(
    html: &str,
    page_url: &Url,
    output_dir: &Path,
    limit: usize,
) -> Extraction {
    let links = take_limit(select_links(html, &DISCOURSE_LINKS, "data-url"), limit);

    let mut extraction = Extraction::default();
    for (index, link) in links.iter().enumerate() {
        let title = discourse_title(&link.text).to_string();
        let result = discourse_entry(index + 1, &title, link, page_url, output_dir);
        extraction.push(title, result);
    }
    extraction
}

/// Drop a leading "12. " style number from the link text
fn discourse_title(text: &str) -> &str {
    text.split_once(". ").map_or(text, |(_, rest)| rest)
}

fn discourse_entry(
    seq: usize,
    title: &str,
    link: &RawLink,
    page_url: &Url,
    output_dir: &Path,
) -> Result<Extracted, ParseError> {
    let remote_url = resolve_link(page_url, &link.target)?;
    let filename = clean_filename(&link.target)?;
    let stream_url = format!("audio/discourses/{LANGUAGE}/{filename}");

    let mut item = CatalogItem::new(
        format!("discourse-{LANGUAGE}-{seq:03}"),
        title,
        ContentType::DiscourseMaster,
    );
    item.language = Some(LANGUAGE.to_string());
    item.stream_url = Some(stream_url.clone());

    Ok(Extracted {
        item,
        tasks: vec![TransferTask::new(
            remote_url.to_string(),
            archive_path(output_dir, &stream_url),
        )],
    })
}
