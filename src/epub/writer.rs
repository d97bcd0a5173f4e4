use std::path::Path;

use log::info;

use super::{CONTAINER_PATH, EpubBook, MIMETYPE_PATH};
use crate::archive::Packer;
use crate::error::{ArchiveContext, Result};

/// Write `book` to a new EPUB at `path`.
///
/// Entry order: `mimetype` (stored), `META-INF/container.xml`, the package
/// document as currently held in memory, then [`EpubBook::ordered_files`].
/// Entries keep their archive-relative paths.
pub fn write_epub(book: &EpubBook, path: &Path) -> Result<()> {
    write_entries(book, path).in_archive(book.archive.filename())
}

fn write_entries(book: &EpubBook, path: &Path) -> Result<()> {
    let archive = &book.archive;
    let mut packer = Packer::create(path)?;

    packer.add_stored(MIMETYPE_PATH, &archive.read_file(MIMETYPE_PATH)?)?;
    packer.add_file(CONTAINER_PATH, &archive.absolute_path(CONTAINER_PATH))?;

    let package = book.package.to_bytes()?;
    packer.add_deflated(&book.package.path, &package)?;
    info!("rewrote package document {}", book.package.path);

    for file in book.ordered_files() {
        packer.add_file(file, &archive.absolute_path(file))?;
    }

    packer.finish()
}
