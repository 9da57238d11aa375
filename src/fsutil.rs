//! Atomic file writes.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` so readers see either the old file or the new
/// one, never a partial write. The temp file lives in the target directory so
/// the final rename stays on one filesystem.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
