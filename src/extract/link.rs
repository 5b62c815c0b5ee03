// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::ParseError;

/// Prefix of a media fragment carrying a start offset, as in `file.mp3#t=1:02:03`
const TIME_FRAGMENT_PREFIX: &str = "t=";

/// Derive the on-disk file name for a source link
///
/// The decoded name from [`decoded_filename`] is sanitized into a single
/// path component so an encoded separator cannot leave the target directory.
pub fn clean_filename(url: &str) -> Result<String, ParseError> {
    let decoded = decoded_filename(url)?;
    let cleaned = sanitize_filename::sanitize(&decoded);

    if cleaned.is_empty() {
        return Err(ParseError::MissingFilename {
            href: url.to_string(),
        });
    }

    Ok(cleaned)
}

/// Final path segment of a link, percent-decoded and trimmed
///
/// Drops the query string and fragment. Punctuation is kept as is, so the
/// result is meant for display and never as a path.
pub fn decoded_filename(url: &str) -> Result<String, ParseError> {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    let path = without_fragment
        .split_once('?')
        .map_or(without_fragment, |(head, _)| head);
    let segment = path.rsplit('/').next().unwrap_or(path);

    let decoded = urlencoding::decode_binary(segment.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded).trim().to_string();

    if decoded.is_empty() {
        return Err(ParseError::MissingFilename {
            href: url.to_string(),
        });
    }

    Ok(decoded)
}

/// Read the start offset in whole seconds from a `#t=` fragment
///
/// Accepts `H:M:S`, `M:S` and `S`. Fractional seconds are truncated.
/// A link without a `t=` fragment starts at 0.
pub fn parse_time_fragment(url: &str) -> Result<u64, ParseError> {
    let Some((_, fragment)) = url.split_once('#') else {
        return Ok(0);
    };
    let Some(value) = fragment.strip_prefix(TIME_FRAGMENT_PREFIX) else {
        return Ok(0);
    };

    let malformed = || ParseError::InvalidTimeFragment {
        url: url.to_string(),
        fragment: fragment.to_string(),
    };

    let parts: Vec<&str> = value.split(':').collect();
    let Some((seconds, larger)) = parts.split_last() else {
        return Err(malformed());
    };
    if larger.len() > 2 {
        return Err(malformed());
    }

    let seconds = whole_seconds(seconds).ok_or_else(malformed)?;

    // Remaining parts are minutes then hours, read right to left
    let mut total = seconds;
    let mut unit: u64 = 60;
    for part in larger.iter().rev() {
        let amount = whole_number(part).ok_or_else(malformed)?;
        total = amount
            .checked_mul(unit)
            .and_then(|value| value.checked_add(total))
            .ok_or_else(malformed)?;
        unit *= 60;
    }

    Ok(total)
}

/// Resolve a possibly relative `href` against the page it was found on
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, ParseError> {
    base.join(href).map_err(|e| ParseError::InvalidLink {
        href: href.to_string(),
        reason: e.to_string(),
    })
}

fn whole_number(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Integer part of a non-negative decimal such as `12`, `12.75` or `.5`
fn whole_seconds(part: &str) -> Option<u64> {
    let (integer, fraction) = part.split_once('.').unwrap_or((part, ""));

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if integer.is_empty() {
        return (!fraction.is_empty()).then_some(0);
    }
    whole_number(integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    // === clean_filename ===

    #[test]
    fn filename_is_last_path_segment() {
        assert_eq!(
            clean_filename("https://rssb.org/audio/books/part-1.mp3").unwrap(),
            "part-1.mp3"
        );
    }

    #[test]
    fn filename_drops_query_and_fragment() {
        assert_eq!(
            clean_filename("audio/books/part-1.mp3?v=2#t=1:00").unwrap(),
            "part-1.mp3"
        );
        assert_eq!(clean_filename("audio/part-2.mp3#t=30").unwrap(), "part-2.mp3");
    }

    #[test]
    fn filename_is_percent_decoded() {
        assert_eq!(
            clean_filename("audio/shabads/Naam%20Simran%20-%20Baba%20Ji.mp3").unwrap(),
            "Naam Simran - Baba Ji.mp3"
        );
    }

    #[test]
    fn filename_keeps_non_ascii() {
        assert_eq!(
            clean_filename("audio/%E0%A8%A8%E0%A8%BE%E0%A8%AE.mp3").unwrap(),
            "ਨਾਮ.mp3"
        );
    }

    #[test]
    fn encoded_separator_cannot_escape_directory() {
        let name = clean_filename("audio/..%2F..%2Fetc%2Fpasswd").unwrap();
        assert!(!name.contains('/'));
    }

    #[test]
    fn filename_missing_is_an_error() {
        assert!(matches!(
            clean_filename("https://rssb.org/audio/"),
            Err(ParseError::MissingFilename { .. })
        ));
    }

    #[test]
    fn decoded_filename_keeps_punctuation() {
        assert_eq!(
            decoded_filename("audio/shabads/Kya%20Soyia%3A%20Jaag%3F.mp3#t=5").unwrap(),
            "Kya Soyia: Jaag?.mp3"
        );
        assert_eq!(
            clean_filename("audio/shabads/Kya%20Soyia%3A%20Jaag%3F.mp3").unwrap(),
            "Kya Soyia Jaag.mp3"
        );
    }

    // === parse_time_fragment ===

    #[test]
    fn no_fragment_starts_at_zero() {
        assert_eq!(parse_time_fragment("audio/book.mp3").unwrap(), 0);
    }

    #[test]
    fn unrelated_fragment_starts_at_zero() {
        assert_eq!(parse_time_fragment("audio/book.mp3#chapter-2").unwrap(), 0);
    }

    #[test]
    fn parses_hours_minutes_seconds() {
        assert_eq!(parse_time_fragment("book.mp3#t=1:02:03").unwrap(), 3723);
    }

    #[test]
    fn parses_minutes_seconds() {
        assert_eq!(parse_time_fragment("book.mp3#t=12:34").unwrap(), 754);
    }

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_time_fragment("book.mp3#t=95").unwrap(), 95);
    }

    #[test]
    fn truncates_fractional_seconds() {
        assert_eq!(parse_time_fragment("book.mp3#t=1:02:03.9").unwrap(), 3723);
        assert_eq!(parse_time_fragment("book.mp3#t=0.5").unwrap(), 0);
        assert_eq!(parse_time_fragment("book.mp3#t=.5").unwrap(), 0);
    }

    #[test]
    fn accepts_zero_padded_components() {
        assert_eq!(parse_time_fragment("book.mp3#t=00:05:07").unwrap(), 307);
    }

    #[test]
    fn formula_holds_across_components() {
        for h in [0u64, 1, 3] {
            for m in [0u64, 7, 59] {
                for s in [0u64, 9, 42] {
                    let url = format!("book.mp3#t={h}:{m}:{s}.25");
                    assert_eq!(parse_time_fragment(&url).unwrap(), h * 3600 + m * 60 + s);
                }
            }
        }
    }

    #[test]
    fn rejects_too_many_components() {
        assert!(parse_time_fragment("book.mp3#t=1:2:3:4").is_err());
    }

    #[test]
    fn rejects_empty_and_garbage_values() {
        for bad in ["#t=", "#t=abc", "#t=1::2", "#t=-5", "#t=1.5:20", "#t=1:2x", "#t=1.2.3"] {
            let url = format!("book.mp3{bad}");
            assert!(
                matches!(
                    parse_time_fragment(&url),
                    Err(ParseError::InvalidTimeFragment { .. })
                ),
                "expected {url} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflowing_values() {
        assert!(parse_time_fragment("book.mp3#t=99999999999999999999:00:00").is_err());
    }

    // === resolve_link ===

    #[test]
    fn resolves_relative_links() {
        let base = Url::parse("https://rssb.org/audiobooks.html").unwrap();
        assert_eq!(
            resolve_link(&base, "audio-book.html").unwrap().as_str(),
            "https://rssb.org/audio-book.html"
        );
    }
}
