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

use super::link::{decoded_filename, resolve_link};
use super::{Extracted, Extraction, RawLink, archive_path, select_links, take_limit};

const AUDIO_EXTENSION: &str = ".mp3";
const ATTRIBUTION_SEPARATOR: &str = " - ";
const UNKNOWN_MYSTIC: &str = "Unknown";

static SHABAD_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="audio/shabads"]"#).expect("valid shabad selector")
});

/// Extract shabads from the shabad listing page
///
/// Title and mystic come from the file name (`Title - Mystic.mp3`), the id
/// from the title. Distinct titles can normalize to the same id.
pub fn extract_shabads(html: &str, page_url: &Url, output_dir: &Path, limit: usize) -> Extraction {
    let links: Vec<RawLink> = select_links(html, &SHABAD_LINKS, "href")
        .into_iter()
        .filter(|link| link.target.ends_with(AUDIO_EXTENSION))
        .collect();
    let links = take_limit(links, limit);

    let mut extraction = Extraction::default();
    for link in &links {
        let label = if link.text.is_empty() {
            link.target.clone()
        } else {
            link.text.clone()
        };
        let result = shabad_entry(link, page_url, output_dir);
        extraction.push(label, result);
    }
    extraction
}

/// Split a decoded file name into title and mystic
///
/// `"Naam Simran - Baba Ji.mp3"` gives `("Naam Simran", "Baba Ji")`. Without
/// the separator the mystic is `"Unknown"`.
pub fn split_shabad_name(filename: &str) -> (String, String) {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);

    match stem.split_once(ATTRIBUTION_SEPARATOR) {
        Some((title, mystic)) => (title.trim().to_string(), mystic.trim().to_string()),
        None => (stem.trim().to_string(), UNKNOWN_MYSTIC.to_string()),
    }
}

/// Lower-cased alphanumeric characters of the title
fn shabad_id(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn shabad_entry(link: &RawLink, page_url: &Url, output_dir: &Path) -> Result<Extracted, ParseError> {
    let remote_url = resolve_link(page_url, &link.target)?;
    // The archive name derives from the id, so the title keeps its punctuation
    let filename = decoded_filename(&link.target)?;
    let (title, mystic) = split_shabad_name(&filename);

    let id = shabad_id(&title);
    if id.is_empty() {
        return Err(ParseError::EmptyId { title });
    }

    let stream_url = format!("audio/shabads/{id}{AUDIO_EXTENSION}");

    let mut item = CatalogItem::new(id, title, ContentType::Shabad);
    item.mystic = Some(mystic);
    item.stream_url = Some(stream_url.clone());

    Ok(Extracted {
        item,
        tasks: vec![TransferTask::new(
            remote_url.to_string(),
            archive_path(output_dir, &stream_url),
        )],
    })
}
