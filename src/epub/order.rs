//! Reading-order resolution for EPUB packages.
//!
//! The spine only lists content documents; the images and stylesheets they
//! embed are usually not spine items. The resolver walks the spine, places
//! each item, places every resource its markup references right after it,
//! and finally appends whatever was never reached. The result is a
//! permutation of the archive's content files.

use std::collections::HashMap;
use std::collections::HashSet;
use std::io;

use log::{debug, info};

use crate::epub::package::Package;
use crate::epub::scanner;
use crate::error::{Error, Result};
use crate::util::resolve_href;

/// Read access to the archive's documents by archive-relative path.
pub trait DocumentSource {
    fn read_document(&self, path: &str) -> io::Result<Vec<u8>>;
}

impl DocumentSource for HashMap<String, Vec<u8>> {
    fn read_document(&self, path: &str) -> io::Result<Vec<u8>> {
        self.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path} not in archive"))
        })
    }
}

/// Files not yet placed in the reading order.
#[derive(Debug, Default)]
struct Unassigned<'a> {
    files: HashSet<&'a str>,
}

impl<'a> Unassigned<'a> {
    fn new(content_files: &'a [String]) -> Self {
        Self {
            files: content_files.iter().map(String::as_str).collect(),
        }
    }

    /// Remove `path`, returning whether it was still unassigned.
    fn take(&mut self, path: &str) -> bool {
        self.files.remove(path)
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

/// Compute the reading order of `content_files`.
///
/// `content_files` is every file of the archive except the fixed
/// structural ones (mimetype, container.xml, the package document), in
/// archive-list order. The returned order contains each of them exactly
/// once:
///
/// 1. each spine item, in spine order, followed by the not-yet-placed
///    resources its markup references, in document order;
/// 2. every file nothing referenced, in archive-list order.
///
/// Non-linear spine items are placed like linear ones.
///
/// # Errors
///
/// - [`Error::MissingManifestItem`] when an itemref names an unknown id.
/// - [`Error::Structural`] when a spine item's file is not in the archive.
/// - [`Error::Markup`] when a spine document cannot be tokenized.
/// - [`Error::OrderMismatch`] if the result is not a permutation.
pub fn resolve_reading_order<S: DocumentSource + ?Sized>(
    package: &Package,
    content_files: &[String],
    source: &S,
) -> Result<Vec<String>> {
    let base_dir = package.base_dir();
    debug!("resolving hrefs against {base_dir:?}");

    let mut unassigned = Unassigned::new(content_files);
    let mut ordered: Vec<String> = Vec::with_capacity(content_files.len());

    for itemref in &package.spine.items {
        let item = package
            .manifest
            .get(&itemref.idref)
            .ok_or_else(|| Error::MissingManifestItem {
                id: itemref.idref.clone(),
            })?;

        let path = resolve_href(base_dir, &item.href).ok_or_else(|| {
            Error::Structural(format!(
                "spine item '{}' has href {:?} which is not an archive path",
                item.id, item.href
            ))
        })?;

        if !unassigned.take(&path) {
            if content_files.iter().any(|f| *f == path) {
                debug!("{path} (spine item '{}') already placed", item.id);
                continue;
            }
            return Err(Error::Structural(format!(
                "spine item '{}' refers to {path} which is not in the archive",
                item.id
            )));
        }
        debug!("spine item '{}' -> {path}", item.id);
        ordered.push(path.clone());

        if item.is_markup() {
            place_resources(&path, source, &mut unassigned, &mut ordered)?;
        }
    }

    let remaining = unassigned.len();
    ordered.extend(
        content_files
            .iter()
            .filter(|f| unassigned.contains(f.as_str()))
            .cloned(),
    );
    info!(
        "{} content files ordered, {} of them outside spine references",
        ordered.len(),
        remaining
    );

    if ordered.len() != content_files.len() {
        return Err(Error::OrderMismatch {
            expected: content_files.len(),
            actual: ordered.len(),
        });
    }

    Ok(ordered)
}

/// Append the unassigned resources referenced by the markup at `path`.
fn place_resources<S: DocumentSource + ?Sized>(
    path: &str,
    source: &S,
    unassigned: &mut Unassigned<'_>,
    ordered: &mut Vec<String>,
) -> Result<()> {
    let bytes = source.read_document(path).map_err(|e| Error::ReadFile {
        path: path.to_string(),
        source: e,
    })?;

    let base_dir = crate::util::parent_dir(path);
    let candidates = scanner::scan(&bytes, base_dir).map_err(|e| Error::Markup {
        path: path.to_string(),
        source: e,
    })?;

    for candidate in candidates {
        if unassigned.take(&candidate) {
            debug!("  {candidate} placed after {path}, {} left", unassigned.len());
            ordered.push(candidate);
        } else {
            debug!("  {candidate} already placed or not in archive");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::package::parse_package;

    fn package(manifest: &str, spine: &str) -> Package {
        let opf = format!(
            r#"<package version="3.0"><manifest>{manifest}</manifest><spine>{spine}</spine></package>"#
        );
        parse_package(opf.as_bytes(), "OEBPS/content.opf").unwrap()
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_discovered_images_follow_their_document() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
               <item id="ch2" href="ch2.xhtml" media-type="application/xhtml+xml"/>
               <item id="a" href="img/a.png" media-type="image/png"/>
               <item id="b" href="img/b.png" media-type="image/png"/>"#,
            r#"<itemref idref="ch1"/><itemref idref="ch2"/>"#,
        );
        let content = files(&[
            "OEBPS/ch1.xhtml",
            "OEBPS/ch2.xhtml",
            "OEBPS/img/a.png",
            "OEBPS/img/b.png",
        ]);
        let mut source = HashMap::new();
        source.insert("OEBPS/ch1.xhtml".to_string(), b"<p>no images</p>".to_vec());
        source.insert(
            "OEBPS/ch2.xhtml".to_string(),
            br#"<body><img src="img/b.png"/><img src="img/a.png"/></body>"#.to_vec(),
        );

        let order = resolve_reading_order(&package, &content, &source).unwrap();
        assert_eq!(
            order,
            vec![
                "OEBPS/ch1.xhtml",
                "OEBPS/ch2.xhtml",
                "OEBPS/img/b.png",
                "OEBPS/img/a.png",
            ]
        );
    }

    #[test]
    fn test_unreferenced_files_go_last_in_archive_order() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="ch1"/>"#,
        );
        let content = files(&["OEBPS/a.ttf", "OEBPS/ch1.xhtml", "OEBPS/toc.ncx"]);
        let mut source = HashMap::new();
        source.insert("OEBPS/ch1.xhtml".to_string(), b"<p/>".to_vec());

        let order = resolve_reading_order(&package, &content, &source).unwrap();
        assert_eq!(order, vec!["OEBPS/ch1.xhtml", "OEBPS/a.ttf", "OEBPS/toc.ncx"]);
    }

    #[test]
    fn test_missing_manifest_id_is_fatal() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="ch1"/><itemref idref="ghost"/>"#,
        );
        let content = files(&["OEBPS/ch1.xhtml"]);
        let mut source = HashMap::new();
        source.insert("OEBPS/ch1.xhtml".to_string(), b"<p/>".to_vec());

        let err = resolve_reading_order(&package, &content, &source).unwrap_err();
        assert!(matches!(err, Error::MissingManifestItem { ref id } if id == "ghost"));
    }

    #[test]
    fn test_spine_item_missing_from_archive_is_fatal() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="ch1"/>"#,
        );
        let err = resolve_reading_order(&package, &files(&["OEBPS/other.xhtml"]), &HashMap::<String, Vec<u8>>::new())
            .unwrap_err();
        assert!(matches!(err, Error::Structural(_)), "got {err:?}");
    }

    #[test]
    fn test_non_markup_spine_items_are_not_scanned() {
        let package = package(
            r#"<item id="p1" href="page1.jpg" media-type="image/jpeg"/>
               <item id="p2" href="page2.jpg" media-type="image/jpeg"/>"#,
            r#"<itemref idref="p2"/><itemref idref="p1"/>"#,
        );
        let content = files(&["OEBPS/page1.jpg", "OEBPS/page2.jpg"]);
        // Empty source: reading either image would fail.
        let order = resolve_reading_order(&package, &content, &HashMap::<String, Vec<u8>>::new()).unwrap();
        assert_eq!(order, vec!["OEBPS/page2.jpg", "OEBPS/page1.jpg"]);
    }

    #[test]
    fn test_shared_resource_placed_once_at_first_use() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
               <item id="ch2" href="ch2.xhtml" media-type="text/html"/>"#,
            r#"<itemref idref="ch1"/><itemref idref="ch2" linear="no"/><itemref idref="ch1"/>"#,
        );
        let content = files(&["OEBPS/ch1.xhtml", "OEBPS/ch2.xhtml", "OEBPS/s.css"]);
        let link = br#"<head><link rel="stylesheet" href="s.css"/></head>"#.to_vec();
        let mut source = HashMap::new();
        source.insert("OEBPS/ch1.xhtml".to_string(), link.clone());
        source.insert("OEBPS/ch2.xhtml".to_string(), link);

        let order = resolve_reading_order(&package, &content, &source).unwrap();
        assert_eq!(order, vec!["OEBPS/ch1.xhtml", "OEBPS/s.css", "OEBPS/ch2.xhtml"]);
    }

    #[test]
    fn test_markup_error_names_document() {
        let package = package(
            r#"<item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            r#"<itemref idref="ch1"/>"#,
        );
        let mut source = HashMap::new();
        source.insert("OEBPS/ch1.xhtml".to_string(), b"<p><!-- oops".to_vec());

        let err = resolve_reading_order(&package, &files(&["OEBPS/ch1.xhtml"]), &source)
            .unwrap_err();
        assert!(matches!(err, Error::Markup { ref path, .. } if path == "OEBPS/ch1.xhtml"));
    }
}
