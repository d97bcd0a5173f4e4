use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Remove a stale output file and create the output's parent directories.
pub fn prepare_output(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| Error::OutputExists {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("{} already existed, deleted before re-creating", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes entries to a new ZIP file in exactly the order they are added.
pub struct Packer {
    zip: ZipWriter<File>,
    path: PathBuf,
    stored: SimpleFileOptions,
    deflated: SimpleFileOptions,
    entries: usize,
}

impl Packer {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            zip: ZipWriter::new(file),
            path: path.to_path_buf(),
            stored: SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            deflated: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
            entries: 0,
        })
    }

    /// Add an uncompressed entry (EPUB `mimetype`, comic metadata).
    pub fn add_stored(&mut self, name: &str, data: &[u8]) -> Result<()> {
        debug!("storing {name}");
        self.zip.start_file(name, self.stored)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Add a compressed entry from memory.
    pub fn add_deflated(&mut self, name: &str, data: &[u8]) -> Result<()> {
        debug!("deflating {name}");
        self.zip.start_file(name, self.deflated)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Add a compressed entry copied from a file on disk.
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        debug!("deflating {name} from {}", source.display());
        let mut input = File::open(source).map_err(|e| Error::ReadFile {
            path: source.display().to_string(),
            source: e,
        })?;
        self.zip.start_file(name, self.deflated)?;
        io::copy(&mut input, &mut self.zip)?;
        self.entries += 1;
        Ok(())
    }

    /// Write the central directory and close the file.
    pub fn finish(self) -> Result<()> {
        self.zip.finish()?;
        info!("wrote {} entries to {}", self.entries, self.path.display());
        Ok(())
    }
}
