//! Helpers for files that hold secrets.
//!
//! The configuration file and the token store are both written owner-only.
//! Reading either one with group- or world-accessible permission bits logs
//! a warning; it never fails the caller.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Mode applied to newly created secret files.
pub const OWNER_ONLY: u32 = 0o600;

/// Permission bits that let group or other read or write the file.
const EXPOSED_BITS: u32 = 0o066;

/// Warn if `path` can be read or written by group or other.
///
/// Returns whether a warning was emitted. Missing files are ignored.
pub fn warn_if_exposed(path: &Path) -> bool {
    match exposed_mode(path) {
        Some(mode) => {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{:o}", mode & 0o777),
                "file holding secrets is accessible to group or other users; run `chmod 600 {}`",
                path.display()
            );
            true
        }
        None => false,
    }
}

#[cfg(unix)]
fn exposed_mode(path: &Path) -> Option<u32> {
    let mode = fs::metadata(path).ok()?.permissions().mode();
    (mode & EXPOSED_BITS != 0).then_some(mode)
}

#[cfg(not(unix))]
fn exposed_mode(_path: &Path) -> Option<u32> {
    None
}

/// Write `contents` to `path`, replacing any previous contents.
///
/// A file created by this call gets [`OWNER_ONLY`] permissions; an existing
/// file keeps its mode. Parent directories are created as needed.
pub fn write_secret_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(OWNER_ONLY);

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.flush()
}
