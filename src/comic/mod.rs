//! Comic book archives (CBZ/CBR): page ordering, metadata, repacking.

mod sort;

use std::path::Path;

use log::{debug, info, warn};

use crate::archive::{Archive, Packer};
use crate::config::Config;
use crate::error::{ArchiveContext, Result};
use crate::image;
use crate::metadata::{FlagPlacement, XmlDocument};

pub use sort::order_pages;

/// Name the metadata file is written under.
pub const METADATA_FILE: &str = "ComicInfo.xml";

/// Root element of a freshly created metadata file.
const METADATA_ROOT: &str = "ComicInfo";

/// Files dropped when repacking, matched case-insensitively on the base name.
const IGNORED_FILES: &[&str] = &["thumbs.db"];

/// An extracted comic book.
#[derive(Debug)]
pub struct ComicBook {
    pub archive: Archive,
    metadata_file: Option<String>,
    metadata: XmlDocument,
    pages: Vec<String>,
}

impl ComicBook {
    /// Split an extracted archive into its metadata file and pages.
    ///
    /// Without a `ComicInfo.xml` an empty `<ComicInfo/>` document stands in.
    pub fn from_archive(archive: Archive) -> Result<Self> {
        let name = archive.filename().to_string();
        Self::load(archive).in_archive(&name)
    }

    fn load(archive: Archive) -> Result<Self> {
        // The shallowest match wins; on a tie, the first in list order.
        let metadata_file = archive
            .files()
            .iter()
            .filter(|f| is_metadata_file(f))
            .min_by_key(|f| f.matches('/').count())
            .cloned();

        let mut pages = Vec::new();
        for file in archive.files() {
            let base = base_name(file);
            if is_metadata_file(file) {
                if metadata_file.as_ref() != Some(file) {
                    warn!("{}: ignoring extra metadata file {file}", archive.filename());
                }
            } else if IGNORED_FILES.iter().any(|n| base.eq_ignore_ascii_case(n)) {
                debug!("ignoring {file}");
            } else {
                pages.push(file.clone());
            }
        }

        let metadata = match &metadata_file {
            Some(file) => {
                info!("found metadata file {file}");
                XmlDocument::parse(&archive.read_file(file)?)?
            }
            None => XmlDocument::with_root(METADATA_ROOT),
        };

        Ok(Self {
            archive,
            metadata_file,
            metadata,
            pages,
        })
    }

    /// Archive path of the original metadata file, if there was one.
    pub fn metadata_file(&self) -> Option<&str> {
        self.metadata_file.as_deref()
    }

    pub fn metadata(&self) -> &XmlDocument {
        &self.metadata
    }

    /// Page files in the order they will be written.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn sort_pages(&mut self, config: &Config) {
        let pages = std::mem::take(&mut self.pages);
        self.pages = order_pages(pages, config.case_sensitive_sort);
        info!("sorted {} pages", self.pages.len());
    }

    /// Re-encode convertible pages as WebP.
    ///
    /// A page that fails to convert, or whose WebP name is already taken by
    /// another file, is kept as it was.
    pub fn convert_pages(&mut self, config: &Config) {
        let mut converted = 0;
        for i in 0..self.pages.len() {
            let page = self.pages[i].clone();
            if image::is_convertible(Path::new(&page))
                && self.conversion_target(&page).is_none()
            {
                warn!(
                    "{}: keeping {page}: its WebP name is already in use",
                    self.archive.filename()
                );
                continue;
            }

            let source = self.archive.absolute_path(&page);
            let output = match image::convert_to_webp(&source, config) {
                Ok(output) => output,
                Err(e) => {
                    warn!("{}: keeping {page}: {e}", self.archive.filename());
                    continue;
                }
            };
            let Some(webp) = self.archive.relative_path(&output) else {
                warn!(
                    "{}: keeping {page}: {} is outside the work directory",
                    self.archive.filename(),
                    output.display()
                );
                continue;
            };
            debug!("converted {page} to {webp}");
            self.archive.register_file(webp.clone());
            self.pages[i] = webp;
            converted += 1;
        }
        info!("converted {converted} of {} pages to WebP", self.pages.len());
    }

    /// Archive name `page` would have as WebP, or `None` if a file of that
    /// name already exists.
    fn conversion_target(&self, page: &str) -> Option<String> {
        let output = image::webp_path(&self.archive.absolute_path(page));
        self.archive
            .relative_path(&output)
            .filter(|name| !self.archive.has_file(name))
    }

    /// Add `ArchiveFileInfo optimizedForStreaming="true"` to the metadata.
    pub fn mark_optimized_for_streaming(&mut self) {
        self.metadata
            .mark_optimized_for_streaming(FlagPlacement::FirstChild);
    }

    /// Write the metadata file (stored) followed by the pages (deflated).
    pub fn write(&self, path: &Path) -> Result<()> {
        self.write_entries(path).in_archive(self.archive.filename())
    }

    fn write_entries(&self, path: &Path) -> Result<()> {
        let mut packer = Packer::create(path)?;
        packer.add_stored(METADATA_FILE, &self.metadata.to_bytes()?)?;
        for page in &self.pages {
            packer.add_file(page, &self.archive.absolute_path(page))?;
        }
        packer.finish()
    }
}

/// Output file name for a comic: `.cbz` extension, spaces replaced by `_`,
/// and `(`, `)`, `#` removed.
pub fn output_filename(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    let mut name = String::with_capacity(stem.len() + 4);
    for c in stem.chars() {
        match c {
            ' ' => name.push('_'),
            '(' | ')' | '#' => {}
            c => name.push(c),
        }
    }
    name.push_str(".cbz");
    name
}

fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, base)| base)
}

fn is_metadata_file(path: &str) -> bool {
    base_name(path).eq_ignore_ascii_case(METADATA_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn comic(files: &[(&str, &[u8])]) -> ComicBook {
        let dir = TempDir::new().unwrap();
        for (name, data) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        let names = files.iter().map(|(n, _)| n.to_string()).collect();
        let archive = Archive::new("Test Comic.cbz".into(), dir, names, false);
        ComicBook::from_archive(archive).unwrap()
    }

    #[test]
    fn test_splits_metadata_ignored_and_pages() {
        let book = comic(&[
            ("comicinfo.XML", b"<ComicInfo><Title>X</Title></ComicInfo>"),
            ("Thumbs.db", b""),
            ("b.jpg", b""),
            ("A.jpg", b""),
        ]);
        assert_eq!(book.metadata_file(), Some("comicinfo.XML"));
        assert_eq!(book.pages(), ["b.jpg", "A.jpg"]);
        assert_eq!(book.metadata().root_name(), Some(&b"ComicInfo"[..]));
    }

    #[test]
    fn test_missing_metadata_creates_comic_info() {
        let mut book = comic(&[("1.png", b"")]);
        assert_eq!(book.metadata_file(), None);
        book.mark_optimized_for_streaming();

        let xml = String::from_utf8(book.metadata().to_bytes().unwrap()).unwrap();
        assert!(xml.starts_with("<ComicInfo>"));
        assert!(xml.contains(r#"optimizedForStreaming="true""#));
    }

    #[test]
    fn test_flag_is_first_child() {
        let mut book = comic(&[(
            "ComicInfo.xml",
            b"<ComicInfo><Series>S</Series><Number>1</Number></ComicInfo>",
        )]);
        book.mark_optimized_for_streaming();

        let xml = String::from_utf8(book.metadata().to_bytes().unwrap()).unwrap();
        let flag = xml.find("<ArchiveFileInfo").unwrap();
        assert!(flag < xml.find("<Series>").unwrap());
        assert!(xml.contains("<Number>1</Number>"));
    }

    #[test]
    fn test_sort_pages_uses_config() {
        let mut book = comic(&[("B.jpg", b""), ("a.jpg", b"")]);
        book.sort_pages(&Config::default());
        assert_eq!(book.pages(), ["a.jpg", "B.jpg"]);
        book.sort_pages(&Config::new().with_case_sensitive_sort(true));
        assert_eq!(book.pages(), ["B.jpg", "a.jpg"]);
    }

    #[test]
    fn test_convert_keeps_unconvertible_pages() {
        let mut book = comic(&[("cover.gif", b"GIF89a")]);
        book.convert_pages(&Config::default());
        assert_eq!(book.pages(), ["cover.gif"]);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename(Path::new("/in/Some Comic (2021) #3.cbr")),
            "Some_Comic_2021_3.cbz"
        );
        assert_eq!(output_filename(Path::new("plain.cbz")), "plain.cbz");
    }

    #[test]
    fn test_root_metadata_preferred_over_nested() {
        let book = comic(&[
            ("A/ComicInfo.xml", b"<ComicInfo><Title>nested</Title></ComicInfo>"),
            ("A/p2.jpg", b""),
            ("ComicInfo.xml", b"<ComicInfo><Title>root</Title></ComicInfo>"),
            ("p1.jpg", b""),
        ]);
        assert_eq!(book.metadata_file(), Some("ComicInfo.xml"));
        assert_eq!(book.pages(), ["A/p2.jpg", "p1.jpg"]);

        let xml = String::from_utf8(book.metadata().to_bytes().unwrap()).unwrap();
        assert!(xml.contains("root"));
    }

    #[test]
    fn test_nested_metadata_used_when_alone() {
        let book = comic(&[("A/comicinfo.xml", b"<ComicInfo/>"), ("A/p1.jpg", b"")]);
        assert_eq!(book.metadata_file(), Some("A/comicinfo.xml"));
        assert_eq!(book.pages(), ["A/p1.jpg"]);
    }

    #[test]
    fn test_conversion_target_detects_taken_names() {
        let mut book = comic(&[
            ("ch 1/01.jpg", b""),
            ("02.jpg", b""),
            ("02.webp", b"RIFF"),
            ("03.png", b""),
        ]);
        assert_eq!(book.conversion_target("ch 1/01.jpg").as_deref(), Some("ch 1/01.webp"));
        assert_eq!(book.conversion_target("02.jpg"), None);
        assert_eq!(book.conversion_target("03.png").as_deref(), Some("03.webp"));

        // A name produced by an earlier conversion is taken too.
        book.archive.register_file("03.webp".into());
        assert_eq!(book.conversion_target("03.png"), None);
    }

    #[test]
    fn test_convert_never_overwrites_existing_webp() {
        let mut book = comic(&[("01.jpg", b"not really a jpeg"), ("01.webp", b"RIFF original")]);
        book.convert_pages(&Config::default());

        assert_eq!(book.pages(), ["01.jpg", "01.webp"]);
        let original = fs::read(book.archive.absolute_path("01.webp")).unwrap();
        assert_eq!(original, b"RIFF original");
    }
}
