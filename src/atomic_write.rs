//! Convenience atomic-write helper (spec §4.6 added notes): writes to a
//! sibling temp file and renames it into place, so a crash mid-write never
//! leaves a half-written document at `path`. The mutation engine itself
//! does not depend on this — callers with their own transactional file
//! writer can ignore it and use `Document::save_to_bytes` directly.

use std::io::Write;
use std::path::Path;

use crate::error::HwpxResult;

pub fn write_atomically(path: &Path, bytes: &[u8]) -> HwpxResult<()> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
  tmp.write_all(bytes)?;
  tmp.flush()?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_bytes_and_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.hwpx");
    std::fs::write(&path, b"old").unwrap();
    write_atomically(&path, b"new").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"new");
  }

  #[test]
  fn original_is_untouched_if_write_target_directory_is_missing() {
    let path = Path::new("/nonexistent-directory-for-test/doc.hwpx");
    assert!(write_atomically(path, b"x").is_err());
  }
}
