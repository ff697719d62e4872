//! Export of a container root to a compressed archive.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use hull_common::error::{HullError, Result};

/// Package name used when none is given.
pub const DEFAULT_PACKAGE: &str = "image";

/// Returns the archive path for `package` in `dir`.
#[must_use]
pub fn archive_path(dir: &Path, package: &str) -> PathBuf {
    dir.join(format!("{package}.tar.gz"))
}

/// Writes the tree at `root` as a gzip-compressed tar archive to `output`.
///
/// Entries are stored relative to `root`.
///
/// # Errors
///
/// Returns [`HullError::NotFound`] if `root` is not a directory, or an I/O
/// error if the archive cannot be written.
pub fn export_root(root: &Path, output: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(HullError::NotFound {
            kind: "container root",
            id: root.display().to_string(),
        });
    }
    let file = File::create(output).map_err(|e| HullError::io(output, e))?;
    let mut archive = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    archive.follow_symlinks(false);
    archive
        .append_dir_all(".", root)
        .map_err(|e| HullError::io(root, e))?;
    let _ = archive
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| HullError::io(output, e))?;
    tracing::info!(root = %root.display(), output = %output.display(), "container root exported");
    Ok(())
}
