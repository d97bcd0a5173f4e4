//! Error types for streambook operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while extracting, ordering, or repacking a book.
///
/// Every error that escapes [`crate::optimize`] is wrapped in
/// [`Error::InArchive`] so the message names the archive being processed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("could not read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing or duplicate root descriptor, missing fixed files.
    #[error("invalid archive structure: {0}")]
    Structural(String),

    /// A spine itemref names an id the manifest does not declare.
    #[error("spine references manifest item '{id}' which does not exist")]
    MissingManifestItem { id: String },

    /// The resolved order does not account for every file exactly once.
    #[error("ordered {actual} files but the archive holds {expected} content files")]
    OrderMismatch { expected: usize, actual: usize },

    #[error("could not tokenize markup in {path}: {source}")]
    Markup {
        path: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{tool} exited with {status}")]
    ExternalTool { tool: String, status: String },

    #[error("unrecognized archive format (not ZIP or RAR)")]
    UnknownArchive,

    #[error("unsupported book type: {0}")]
    UnsupportedBook(String),

    #[error("{0} cannot be converted to WebP")]
    UnsupportedImage(String),

    #[error("output {} already exists and could not be removed: {source}", path.display())]
    OutputExists {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{archive}: {source}")]
    InArchive {
        archive: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the innermost error, looking through archive context.
    pub fn root(&self) -> &Error {
        match self {
            Error::InArchive { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach the archive filename to an error.
pub(crate) trait ArchiveContext<T> {
    fn in_archive(self, archive: &str) -> Result<T>;
}

impl<T> ArchiveContext<T> for Result<T> {
    fn in_archive(self, archive: &str) -> Result<T> {
        self.map_err(|e| match e {
            e @ Error::InArchive { .. } => e,
            e => Error::InArchive {
                archive: archive.to_string(),
                source: Box::new(e),
            },
        })
    }
}
