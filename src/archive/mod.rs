//! Extracted archives and the ZIP packer that writes them back out.

mod extract;
mod pack;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::TempDir;

use crate::epub::DocumentSource;
use crate::error::{Error, Result};

pub use extract::{ArchiveFormat, extract, sniff_format};
pub use pack::{Packer, prepare_output};

/// Kind of book found inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Unknown,
    ComicBook,
    EPub,
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveType::Unknown => "Unknown",
            ArchiveType::ComicBook => "ComicBook",
            ArchiveType::EPub => "EPub",
        })
    }
}

/// Owner of the extraction directory.
#[derive(Debug)]
enum WorkDir {
    /// Deleted when dropped.
    Temp(TempDir),
    /// Left on disk.
    Kept(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Temp(dir) => dir.path(),
            WorkDir::Kept(path) => path,
        }
    }
}

/// An archive extracted into a private working directory.
///
/// The file list is fixed at extraction time. Paths are archive-relative,
/// `/`-separated, and sorted the way the directory walk produced them.
#[derive(Debug)]
pub struct Archive {
    filename: String,
    archive_type: ArchiveType,
    work_dir: WorkDir,
    files: Vec<String>,
}

impl Archive {
    pub(crate) fn new(filename: String, dir: TempDir, files: Vec<String>, retain: bool) -> Self {
        let work_dir = if retain {
            let path = dir.keep();
            info!("keeping work directory {}", path.display());
            WorkDir::Kept(path)
        } else {
            WorkDir::Temp(dir)
        };

        let mut archive = Self {
            filename,
            archive_type: ArchiveType::Unknown,
            work_dir,
            files,
        };
        archive.archive_type = archive.detect_type();
        archive
    }

    /// Path of the archive this was extracted from, as given.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    /// Working directory holding the extracted files.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Archive-relative paths of every extracted file.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn absolute_path(&self, relative: &str) -> PathBuf {
        self.work_dir().join(relative)
    }

    /// Archive-relative name of a path inside the work directory.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        path.strip_prefix(self.work_dir())
            .ok()
            .map(extract::to_archive_path)
    }

    pub fn has_file(&self, relative: &str) -> bool {
        self.files.iter().any(|f| f == relative)
    }

    /// Read an extracted file.
    pub fn read_file(&self, relative: &str) -> Result<Vec<u8>> {
        std::fs::read(self.absolute_path(relative)).map_err(|e| Error::ReadFile {
            path: relative.to_string(),
            source: e,
        })
    }

    /// Add a file created in the work directory after extraction.
    pub(crate) fn register_file(&mut self, relative: String) {
        if !self.has_file(&relative) {
            self.files.push(relative);
        }
    }

    fn detect_type(&self) -> ArchiveType {
        if self.has_file(crate::epub::CONTAINER_PATH) {
            return ArchiveType::EPub;
        }

        let is_cb = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.len() == 3 && ext.to_ascii_lowercase().starts_with("cb"));
        if is_cb {
            ArchiveType::ComicBook
        } else {
            ArchiveType::Unknown
        }
    }
}

impl DocumentSource for Archive {
    fn read_document(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.absolute_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(filename: &str, files: &[&str]) -> Archive {
        let dir = TempDir::new().unwrap();
        let files = files.iter().map(|f| f.to_string()).collect();
        Archive::new(filename.to_string(), dir, files, false)
    }

    #[test]
    fn test_detect_epub_by_container() {
        let a = archive("book.zip", &["mimetype", "META-INF/container.xml"]);
        assert_eq!(a.archive_type(), ArchiveType::EPub);
    }

    #[test]
    fn test_detect_comic_by_extension() {
        assert_eq!(archive("x.cbz", &["1.jpg"]).archive_type(), ArchiveType::ComicBook);
        assert_eq!(archive("x.CBR", &["1.jpg"]).archive_type(), ArchiveType::ComicBook);
        assert_eq!(archive("x.zip", &["1.jpg"]).archive_type(), ArchiveType::Unknown);
        assert_eq!(archive("x.cbzz", &["1.jpg"]).archive_type(), ArchiveType::Unknown);
    }

    #[test]
    fn test_work_dir_removed_on_drop() {
        let a = archive("x.cbz", &[]);
        let dir = a.work_dir().to_path_buf();
        assert!(dir.exists());
        drop(a);
        assert!(!dir.exists());
    }

    #[test]
    fn test_work_dir_retained() {
        let dir = TempDir::new().unwrap();
        let a = Archive::new("x.cbz".into(), dir, Vec::new(), true);
        let path = a.work_dir().to_path_buf();
        drop(a);
        assert!(path.exists());
        std::fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_relative_path() {
        let a = archive("x.cbz", &["ch 1/01.jpg"]);
        let absolute = a.absolute_path("ch 1/01.webp");
        assert_eq!(a.relative_path(&absolute).as_deref(), Some("ch 1/01.webp"));
        assert_eq!(a.relative_path(Path::new("/elsewhere/01.webp")), None);
    }

    #[test]
    fn test_read_file_error_names_path() {
        let a = archive("x.cbz", &[]);
        let err = a.read_file("missing.xml").unwrap_err();
        assert!(matches!(err, Error::ReadFile { ref path, .. } if path == "missing.xml"));
    }
}
