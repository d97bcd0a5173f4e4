//! Resource discovery in XHTML/HTML content documents.
//!
//! This is a sweep over the token stream, not a DOM build: only three
//! element/attribute pairs are looked at and everything else is skipped.
//!
//! | element                     | attribute |
//! |-----------------------------|-----------|
//! | `picture`                   | `srcset`  |
//! | `img`                       | `src`     |
//! | `link rel="stylesheet"`     | `href`    |

use log::trace;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::util::{decode_document, local_name, resolve_href};

/// Scan a markup document for embedded resources.
///
/// Returns archive-relative paths in document order, resolved against
/// `base_dir` (the directory holding the document). References that cannot
/// point into the archive (remote URLs, `data:` URIs) are dropped. The
/// result depends only on the arguments.
pub fn scan(document: &[u8], base_dir: &str) -> Result<Vec<String>, quick_xml::Error> {
    let content = decode_document(document);
    let mut reader = Reader::from_str(&content);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut found = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                for reference in references(&e) {
                    trace!("found reference {reference:?}");
                    if let Some(path) = resolve_href(base_dir, &reference) {
                        found.push(path);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// Raw resource references carried by one element.
fn references(e: &BytesStart<'_>) -> Vec<String> {
    let name = e.name();
    let tag = local_name(name.as_ref());

    if tag.eq_ignore_ascii_case(b"picture") {
        html_attr(e, b"srcset")
            .map(|v| srcset_urls(&v))
            .unwrap_or_default()
    } else if tag.eq_ignore_ascii_case(b"img") {
        html_attr(e, b"src").into_iter().collect()
    } else if tag.eq_ignore_ascii_case(b"link") {
        let is_stylesheet = html_attr(e, b"rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("stylesheet"))
        });
        if is_stylesheet {
            html_attr(e, b"href").into_iter().collect()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    }
}

/// Attribute value, allowing HTML-style unquoted and bare attributes.
/// Empty values count as absent.
fn html_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.html_attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()).eq_ignore_ascii_case(key))
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match quick_xml::escape::unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw,
            }
        })
        .filter(|v| !v.trim().is_empty())
}

/// URLs from a `srcset` value ("a.jpg 1x, b.jpg 2x" -> ["a.jpg", "b.jpg"]).
fn srcset_urls(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
