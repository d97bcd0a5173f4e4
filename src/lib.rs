//! # streambook
//!
//! Repackages EPUB and comic book archives so that their files are stored in
//! reading order, letting a reader stream the book front to back without
//! seeking around the archive.
//!
//! ## Features
//!
//! - Extract ZIP-based archives in-process and RAR archives through `unrar`
//! - Resolve an EPUB's reading order from its spine plus the images and
//!   stylesheets each chapter references
//! - Sort comic pages by file name, optionally re-encoding them as WebP
//! - Mark the output with `ArchiveFileInfo optimizedForStreaming="true"`,
//!   leaving the rest of the package document byte-for-byte intact
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use streambook::{Config, optimize};
//!
//! let config = Config::new().with_case_sensitive_sort(false);
//! let outcome = optimize(Path::new("in/book.epub"), Path::new("out/book.epub"), &config)?;
//! println!("wrote {} entries to {}", outcome.entries.len(), outcome.output.display());
//! # Ok::<(), streambook::Error>(())
//! ```
//!
//! ## Reading order without an archive
//!
//! The resolver only needs a parsed package, the content file list, and
//! something that can hand back document bytes:
//!
//! ```
//! use std::collections::HashMap;
//! use streambook::epub::{parse_package, resolve_reading_order};
//!
//! let opf = br#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
//!   <manifest>
//!     <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
//!   </manifest>
//!   <spine><itemref idref="c1"/></spine>
//! </package>"#;
//! let package = parse_package(opf, "OEBPS/content.opf")?;
//!
//! let mut docs = HashMap::new();
//! docs.insert(
//!     "OEBPS/c1.xhtml".to_string(),
//!     br#"<html><body><img src="img/a.png"/></body></html>"#.to_vec(),
//! );
//! let files: Vec<String> = ["OEBPS/img/a.png", "OEBPS/c1.xhtml", "OEBPS/notes.txt"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//!
//! let order = resolve_reading_order(&package, &files, &docs)?;
//! assert_eq!(order, ["OEBPS/c1.xhtml", "OEBPS/img/a.png", "OEBPS/notes.txt"]);
//! # Ok::<(), streambook::Error>(())
//! ```

pub mod archive;
pub mod comic;
pub mod config;
pub mod epub;
pub mod error;
pub mod image;
pub mod metadata;
mod pipeline;
mod tool;
pub mod util;

pub use archive::{Archive, ArchiveType};
pub use comic::ComicBook;
pub use config::Config;
pub use epub::EpubBook;
pub use error::{Error, Result};
pub use metadata::XmlDocument;
pub use pipeline::{Outcome, Prepared, optimize, plan};
