//! Extract, order, flag, and repack one archive.

use std::path::{Path, PathBuf};

use log::info;

use crate::archive::{self, ArchiveType, prepare_output};
use crate::comic::{self, ComicBook};
use crate::config::Config;
use crate::epub::{self, EpubBook};
use crate::error::{ArchiveContext, Error, Result};

/// A book that has been extracted, ordered, and flagged, ready to write.
#[derive(Debug)]
pub enum Prepared {
    Epub(EpubBook),
    Comic(ComicBook),
}

impl Prepared {
    pub fn archive_type(&self) -> ArchiveType {
        match self {
            Prepared::Epub(_) => ArchiveType::EPub,
            Prepared::Comic(_) => ArchiveType::ComicBook,
        }
    }

    /// Entry names in the order they will be written.
    pub fn entries(&self) -> Vec<String> {
        match self {
            Prepared::Epub(book) => book
                .structural_files()
                .iter()
                .map(|f| f.to_string())
                .chain(book.ordered_files().iter().cloned())
                .collect(),
            Prepared::Comic(book) => std::iter::once(comic::METADATA_FILE.to_string())
                .chain(book.pages().iter().cloned())
                .collect(),
        }
    }

    /// Where the book ends up when `requested` is asked for.
    ///
    /// Comic books are always written as `.cbz` with a sanitized file name.
    pub fn output_path(&self, requested: &Path) -> PathBuf {
        match self {
            Prepared::Epub(_) => requested.to_path_buf(),
            Prepared::Comic(_) => requested.with_file_name(comic::output_filename(requested)),
        }
    }

    /// Write the book to `path`, replacing any file already there.
    pub fn write(&self, path: &Path) -> Result<()> {
        prepare_output(path)?;
        match self {
            Prepared::Epub(book) => epub::write_epub(book, path),
            Prepared::Comic(book) => book.write(path),
        }
    }
}

/// What [`optimize`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: PathBuf,
    pub archive_type: ArchiveType,
    pub entries: Vec<String>,
}

/// Run every stage except writing.
pub fn plan(input: &Path, config: &Config) -> Result<Prepared> {
    let name = input.display().to_string();
    let archive = archive::extract(input, config).in_archive(&name)?;

    match archive.archive_type() {
        ArchiveType::EPub => {
            let mut book = EpubBook::from_archive(archive)?;
            book.order_files()?;
            book.mark_optimized_for_streaming();
            Ok(Prepared::Epub(book))
        }
        ArchiveType::ComicBook => {
            let mut book = ComicBook::from_archive(archive)?;
            book.sort_pages(config);
            if config.convert_images {
                book.convert_pages(config);
            }
            book.mark_optimized_for_streaming();
            Ok(Prepared::Comic(book))
        }
        ArchiveType::Unknown => Err(Error::UnsupportedBook(
            "neither an EPUB nor a comic book archive".into(),
        ))
        .in_archive(&name),
    }
}

/// Rewrite `input` as a streaming-optimized archive at `output`.
///
/// For comic books the file name of `output` is adjusted, see
/// [`Prepared::output_path`]; the path actually written is in the returned
/// [`Outcome`].
pub fn optimize(input: &Path, output: &Path, config: &Config) -> Result<Outcome> {
    let prepared = plan(input, config)?;
    let output = prepared.output_path(output);

    prepared
        .write(&output)
        .in_archive(&input.display().to_string())?;
    info!("created {}", output.display());

    Ok(Outcome {
        archive_type: prepared.archive_type(),
        entries: prepared.entries(),
        output,
    })
}
