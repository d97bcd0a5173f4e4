//! Properties of reading-order resolution over generated packages.

use std::collections::HashMap;

use proptest::prelude::*;
use streambook::Error;
use streambook::epub::{Package, parse_package, resolve_reading_order};

/// A generated book: chapters, the images each chapter shows, and files
/// nothing refers to.
#[derive(Debug, Clone)]
struct GeneratedBook {
    chapters: usize,
    images: usize,
    spine: Vec<usize>,
    references: Vec<Vec<usize>>,
    extras: usize,
}

fn chapter_path(i: usize) -> String {
    format!("OEBPS/text/ch{i}.xhtml")
}

fn image_path(i: usize) -> String {
    format!("OEBPS/images/img{i}.png")
}

fn book_strategy() -> impl Strategy<Value = GeneratedBook> {
    (1usize..8, 0usize..10, 0usize..4).prop_flat_map(|(chapters, images, extras)| {
        let spine = Just((0..chapters).collect::<Vec<_>>()).prop_shuffle();
        let refs = prop::collection::vec(
            prop::collection::vec(0..images.max(1), 0..6),
            chapters,
        );
        (spine, refs).prop_map(move |(spine, references)| GeneratedBook {
            chapters,
            images,
            spine,
            references: if images == 0 {
                vec![Vec::new(); chapters]
            } else {
                references
            },
            extras,
        })
    })
}

impl GeneratedBook {
    fn package(&self, spine_override: Option<&str>) -> Package {
        let mut opf = String::from(
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0"><manifest>"#,
        );
        for i in 0..self.chapters {
            opf.push_str(&format!(
                r#"<item id="ch{i}" href="text/ch{i}.xhtml" media-type="application/xhtml+xml"/>"#
            ));
        }
        for i in 0..self.images {
            opf.push_str(&format!(
                r#"<item id="img{i}" href="images/img{i}.png" media-type="image/png"/>"#
            ));
        }
        opf.push_str("</manifest><spine>");
        for i in &self.spine {
            opf.push_str(&format!(r#"<itemref idref="ch{i}"/>"#));
        }
        if let Some(id) = spine_override {
            opf.push_str(&format!(r#"<itemref idref="{id}"/>"#));
        }
        opf.push_str("</spine></package>");
        parse_package(opf.as_bytes(), "OEBPS/content.opf").unwrap()
    }

    fn documents(&self) -> HashMap<String, Vec<u8>> {
        let mut docs = HashMap::new();
        for (i, refs) in self.references.iter().enumerate() {
            let mut body = String::from("<html><body>");
            for r in refs {
                body.push_str(&format!(r#"<img src="../images/img{r}.png"/>"#));
            }
            body.push_str("</body></html>");
            docs.insert(chapter_path(i), body.into_bytes());
        }
        docs
    }

    fn content_files(&self) -> Vec<String> {
        let mut files: Vec<String> = (0..self.chapters).map(chapter_path).collect();
        files.extend((0..self.images).map(image_path));
        files.extend((0..self.extras).map(|i| format!("OEBPS/misc/extra{i}.txt")));
        files.sort();
        files
    }
}

proptest! {
    #[test]
    fn prop_order_is_total_and_deterministic(book in book_strategy()) {
        let package = book.package(None);
        let docs = book.documents();
        let files = book.content_files();

        let first = resolve_reading_order(&package, &files, &docs).unwrap();
        let second = resolve_reading_order(&package, &files, &docs).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.len(), files.len());
        let mut sorted = first.clone();
        sorted.sort();
        prop_assert_eq!(&sorted, &files);
    }

    #[test]
    fn prop_spine_order_and_discovery(book in book_strategy()) {
        let package = book.package(None);
        let order = resolve_reading_order(&package, &book.content_files(), &book.documents())
            .unwrap();
        let position = |path: &str| order.iter().position(|p| p == path).unwrap();

        let spine_positions: Vec<usize> =
            book.spine.iter().map(|&i| position(&chapter_path(i))).collect();
        prop_assert!(spine_positions.windows(2).all(|w| w[0] < w[1]));

        // Every referenced image sits after the first chapter (in spine order)
        // that references it and before the next spine chapter.
        for (n, &chapter) in book.spine.iter().enumerate() {
            let start = spine_positions[n];
            let end = spine_positions.get(n + 1).copied().unwrap_or(order.len());
            for &img in &book.references[chapter] {
                let claimed_earlier = book.spine[..n]
                    .iter()
                    .any(|&c| book.references[c].contains(&img));
                if !claimed_earlier {
                    let at = position(&image_path(img));
                    prop_assert!(start < at && at < end);
                }
            }
        }
    }

    #[test]
    fn prop_unknown_spine_id_is_fatal(book in book_strategy()) {
        let package = book.package(Some("missing-item"));
        let err = resolve_reading_order(&package, &book.content_files(), &book.documents())
            .unwrap_err();
        let rejected = matches!(err, Error::MissingManifestItem { ref id } if id == "missing-item");
        prop_assert!(rejected);
    }
}
