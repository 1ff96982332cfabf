//! Durable write primitive
//!
//! Every file this system persists goes through `write_atomic`: write to a
//! sibling temp file, flush to disk, then rename over the target. A crash
//! mid-write leaves the previous version intact, never a partial file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Atomically replace `path` with `bytes`.
///
/// The temp file lives in the same directory as the target so the rename
/// stays on one filesystem. On failure the target is untouched; a stale
/// `.tmp` file may remain and is overwritten by the next write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;

    let mut tmp_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)
}
