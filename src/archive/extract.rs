use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};
use std::process::Command;

use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::Archive;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tool;

/// unrar's exit code for CRC errors; whatever was extracted is still usable.
const UNRAR_CRC_ERROR: i32 = 3;

/// Container format, detected from the first bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

/// Detect the container format from magic bytes. File extensions are not
/// trusted; plenty of `.cbr` files are really ZIPs.
pub fn sniff_format(header: &[u8]) -> Option<ArchiveFormat> {
    if header.starts_with(b"Rar!") {
        Some(ArchiveFormat::Rar)
    } else if header.starts_with(b"PK") {
        Some(ArchiveFormat::Zip)
    } else {
        None
    }
}

/// Extract `path` into a fresh working directory.
pub fn extract(path: &Path, config: &Config) -> Result<Archive> {
    let mut header = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut header)?;
    let format = sniff_format(&header).ok_or(Error::UnknownArchive)?;

    let dir = tempfile::Builder::new().prefix("streambook").tempdir()?;
    info!("extracting {} ({format:?}) into {}", path.display(), dir.path().display());

    match format {
        ArchiveFormat::Zip => extract_zip(path, dir.path())?,
        ArchiveFormat::Rar => {
            let mut command = Command::new("unrar");
            command.arg("x").arg("-y").arg(path).current_dir(dir.path());
            tool::run(&mut command, "unrar", config, &[UNRAR_CRC_ERROR])?;
        }
    }

    let files = list_files(dir.path())?;
    let archive = Archive::new(
        path.display().to_string(),
        dir,
        files,
        config.retain_temp_dir,
    );
    info!(
        "found {} files, archive type {}",
        archive.files().len(),
        archive.archive_type()
    );
    Ok(archive)
}

fn extract_zip(path: &Path, dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(path)?)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping entry {:?} which escapes the archive", entry.name());
            continue;
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("extracting {}", entry.name());
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;
    }
    Ok(())
}

/// Every regular file under `root`, as sorted `/`-separated relative paths.
fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            debug!("found entry {}", relative.display());
            files.push(to_archive_path(relative));
        }
    }
    Ok(files)
}

pub(super) fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(b"Rar!\x1a\x07"), Some(ArchiveFormat::Rar));
        assert_eq!(sniff_format(b"PK\x03\x04"), Some(ArchiveFormat::Zip));
        assert_eq!(sniff_format(b"%PDF"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn test_extract_zip_lists_sorted_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.cbr");

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        for name in ["b/2.jpg", "a.jpg", "b/1.jpg"] {
            zip.start_file(name, options).unwrap();
            zip.write_all(name.as_bytes()).unwrap();
        }
        zip.add_directory("empty/", options).unwrap();
        zip.finish().unwrap();

        let archive = extract(&path, &Config::default()).unwrap();
        assert_eq!(archive.files(), ["a.jpg", "b/1.jpg", "b/2.jpg"]);
        // Sniffed as ZIP despite the .cbr extension, typed by extension.
        assert_eq!(archive.archive_type(), crate::archive::ArchiveType::ComicBook);
        assert_eq!(archive.read_file("b/1.jpg").unwrap(), b"b/1.jpg");
    }

    #[test]
    fn test_extract_unknown_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.cbz");
        fs::write(&path, b"just some text").unwrap();

        let err = extract(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownArchive));
    }

    #[test]
    fn test_to_archive_path() {
        assert_eq!(to_archive_path(Path::new("OEBPS/text/ch1.xhtml")), "OEBPS/text/ch1.xhtml");
        assert_eq!(to_archive_path(Path::new("mimetype")), "mimetype");
    }
}
