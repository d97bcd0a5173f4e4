//! Text decoding and archive path helpers shared by the EPUB and comic code.

use std::borrow::Cow;

use encoding_rs::Encoding;
use memchr::memmem;
use percent_encoding::percent_decode_str;

/// Drop a leading UTF-8 byte order mark.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Decode document bytes: UTF-8 if valid, else the declared encoding, else
/// Windows-1252.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    decode_with_encoding(bytes, hint_encoding).0
}

/// Like [`decode_text`], also returning the encoding the bytes were read as.
///
/// A UTF-16 byte order mark selects UTF-16.
pub fn decode_with_encoding<'a>(
    bytes: &'a [u8],
    hint_encoding: Option<&str>,
) -> (Cow<'a, str>, &'static Encoding) {
    let (result, encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return (result, encoding);
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = Encoding::for_label(name.as_bytes())
    {
        let (result, used, _) = encoding.decode(bytes);
        return (result, used);
    }

    let (result, used, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    (result, used)
}

/// The `encoding` pseudo-attribute of an XML declaration in the first
/// 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let (&quote, rest) = after_enc.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = memchr::memchr(quote, rest)?;
    std::str::from_utf8(&rest[..value_end]).ok()
}

/// Decode a whole markup document using its declared encoding as a hint.
pub fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    decode_document_with_encoding(bytes).0
}

/// [`decode_document`] plus the encoding it was decoded from.
pub fn decode_document_with_encoding(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    decode_with_encoding(strip_bom(bytes), extract_xml_encoding(bytes))
}

/// `dc:title` -> `title`.
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Directory part of an archive-relative path ("OEBPS/content.opf" -> "OEBPS").
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Resolve a document reference against an archive-relative base directory.
///
/// Fragments and queries are dropped and percent escapes decoded. Returns
/// `None` for references that cannot name a file inside the archive:
/// absolute URLs, `data:` URIs, and empty or fragment-only references.
///
/// ```
/// use streambook::util::resolve_href;
///
/// assert_eq!(resolve_href("OEBPS/text", "../images/a.png").as_deref(), Some("OEBPS/images/a.png"));
/// assert_eq!(resolve_href("OEBPS", "/style.css").as_deref(), Some("style.css"));
/// assert_eq!(resolve_href("OEBPS", "http://example.com/a.png"), None);
/// ```
pub fn resolve_href(base_dir: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let href = href.split(['#', '?']).next().unwrap_or_default();
    if href.is_empty() || has_scheme(href) {
        return None;
    }

    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut stack: Vec<&str> = Vec::new();
    if !decoded.starts_with('/') {
        stack.extend(base_dir.split('/').filter(|s| !s.is_empty() && *s != "."));
    }

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }

    if stack.is_empty() {
        None
    } else {
        Some(stack.join("/"))
    }
}

/// True for `http:`, `mailto:`, `data:` and similar URL schemes.
fn has_scheme(href: &str) -> bool {
    match href.find(':') {
        Some(colon) => {
            let scheme = &href[..colon];
            // A single letter is a Windows drive, not a scheme.
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
