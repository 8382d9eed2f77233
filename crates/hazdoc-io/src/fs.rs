//! Atomic output writes: temp file in the destination directory, flush + `sync_all`, then a
//! rename over the destination. A failed write leaves any existing file untouched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare file names.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

pub(crate) fn atomic_write_bytes(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| err.error)?;

    // Best effort; the file is already in place.
    let _ = File::open(dir).and_then(|d| d.sync_all());
    Ok(())
}
