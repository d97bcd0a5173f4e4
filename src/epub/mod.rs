//! EPUB books: package parsing, reading-order resolution, and repacking.

mod order;
pub mod package;
pub mod scanner;
mod writer;

use log::info;

use crate::archive::Archive;
use crate::error::{ArchiveContext, Error, Result};

pub use order::{DocumentSource, resolve_reading_order};
pub use package::{
    ContainerPointer, Manifest, ManifestItem, Package, RootFile, Spine, SpineItem,
    parse_container, parse_package,
};
pub use scanner::scan;
pub use writer::write_epub;

/// The `mimetype` entry, which must come first and uncompressed.
pub const MIMETYPE_PATH: &str = "mimetype";

/// Required content of the `mimetype` entry.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// An extracted EPUB with its parsed package document.
#[derive(Debug)]
pub struct EpubBook {
    pub archive: Archive,
    pub container: ContainerPointer,
    pub package: Package,
    ordered_files: Vec<String>,
}

impl EpubBook {
    /// Validate the fixed files of an extracted EPUB and parse its package.
    pub fn from_archive(archive: Archive) -> Result<Self> {
        let name = archive.filename().to_string();
        Self::load(archive).in_archive(&name)
    }

    fn load(archive: Archive) -> Result<Self> {
        if !archive.has_file(MIMETYPE_PATH) {
            return Err(Error::Structural("no mimetype file".into()));
        }
        let mimetype = archive.read_file(MIMETYPE_PATH)?;
        if String::from_utf8_lossy(&mimetype).trim() != EPUB_MIMETYPE {
            return Err(Error::Structural(format!(
                "mimetype is not {EPUB_MIMETYPE}"
            )));
        }

        if !archive.has_file(CONTAINER_PATH) {
            return Err(Error::Structural(format!("no {CONTAINER_PATH}")));
        }
        let container = parse_container(&archive.read_file(CONTAINER_PATH)?)?;
        info!("{CONTAINER_PATH} found and valid");

        let package_path = container.package_path().to_string();
        if !archive.has_file(&package_path) {
            return Err(Error::Structural(format!(
                "package document {package_path} named in {CONTAINER_PATH} is missing"
            )));
        }
        let package = parse_package(&archive.read_file(&package_path)?, &package_path)?;
        info!(
            "package {package_path} found and valid: {} manifest items, {} spine items",
            package.manifest.len(),
            package.spine.items.len()
        );

        let mut book = Self {
            archive,
            container,
            package,
            ordered_files: Vec::new(),
        };
        book.ordered_files = book.content_files();
        Ok(book)
    }

    /// Files written ahead of the content, in their mandated order.
    pub fn structural_files(&self) -> [&str; 3] {
        [MIMETYPE_PATH, CONTAINER_PATH, self.container.package_path()]
    }

    /// Every file except the structural ones, in archive-list order.
    pub fn content_files(&self) -> Vec<String> {
        let structural = self.structural_files();
        self.archive
            .files()
            .iter()
            .filter(|f| !structural.contains(&f.as_str()))
            .cloned()
            .collect()
    }

    /// Content files in the order they will be written.
    ///
    /// Archive-list order until [`EpubBook::order_files`] succeeds.
    pub fn ordered_files(&self) -> &[String] {
        &self.ordered_files
    }

    /// Replace the file order with the resolved reading order.
    ///
    /// On error the previous order is left untouched.
    pub fn order_files(&mut self) -> Result<()> {
        let name = self.archive.filename().to_string();
        let content = self.content_files();
        let ordered = resolve_reading_order(&self.package, &content, &self.archive)
            .in_archive(&name)?;

        let total = self.archive.files().len();
        check_totality(ordered.len(), self.structural_files().len(), total).in_archive(&name)?;

        info!("{total} files total, {} ordered", ordered.len());
        self.ordered_files = ordered;
        Ok(())
    }

    /// Add `ArchiveFileInfo optimizedForStreaming="true"` to the package.
    pub fn mark_optimized_for_streaming(&mut self) {
        self.package.mark_optimized_for_streaming();
    }
}

/// Ordered content plus the structural files must account for every file.
fn check_totality(ordered: usize, structural: usize, total: usize) -> Result<()> {
    if ordered + structural != total {
        return Err(Error::OrderMismatch {
            expected: total.saturating_sub(structural),
            actual: ordered,
        });
    }
    Ok(())
}
