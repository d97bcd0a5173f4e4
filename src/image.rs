//! Page recompression through the external `cwebp` encoder.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tool;

const CONVERTIBLE: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has an extension `cwebp` accepts.
pub fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CONVERTIBLE.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

/// Where [`convert_to_webp`] writes the encoded copy of `path`.
pub fn webp_path(path: &Path) -> PathBuf {
    path.with_extension("webp")
}

/// Encode `path` as WebP next to the original and return the new path.
///
/// The original file is left in place.
pub fn convert_to_webp(path: &Path, config: &Config) -> Result<PathBuf> {
    if !is_convertible(path) {
        return Err(Error::UnsupportedImage(path.display().to_string()));
    }

    let output = webp_path(path);
    debug!("converting {} to {}", path.display(), output.display());

    let mut command = Command::new("cwebp");
    command.arg("-quiet").arg(path).arg("-o").arg(&output);
    tool::run(&mut command, "cwebp", config, &[])?;

    Ok(output)
}
