//! ZIP member handling (spec §6), grounded on the open-package-convention
//! read/override/copy-through pattern used for spreadsheet container
//! rewriting: read every named member out of the original archive, then
//! re-emit an archive that substitutes only the members a save pass
//! produced new bytes for, copying everything else through unchanged.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::HwpxResult;

/// A read-only view over an opened HWPX container: every member's raw
/// bytes, keyed by its path inside the archive (e.g. `"Contents/section0.xml"`).
#[derive(Debug, Clone, Default)]
pub struct Container {
  members: HashMap<String, Vec<u8>>,
  /// Preserves original insertion order so re-emitted archives keep a
  /// stable member order even though `members` is a `HashMap`.
  order: Vec<String>,
}

impl Container {
  /// Reads every member out of a ZIP archive's bytes.
  pub fn open(bytes: &[u8]) -> HwpxResult<Self> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut members = HashMap::with_capacity(archive.len());
    let mut order = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
      let mut entry = archive.by_index(i)?;
      let name = entry.name().to_string();
      let mut data = Vec::with_capacity(entry.size() as usize);
      entry.read_to_end(&mut data)?;
      order.push(name.clone());
      members.insert(name, data);
    }
    Ok(Container { members, order })
  }

  pub fn get(&self, name: &str) -> Option<&[u8]> {
    self.members.get(name).map(|v| v.as_slice())
  }

  pub fn member_names(&self) -> impl Iterator<Item = &str> {
    self.order.iter().map(String::as_str)
  }

  /// Re-emits the container as ZIP bytes, substituting `overrides` for the
  /// matching member names and copying every other member through
  /// byte-for-byte. Members named in `overrides` that were not already
  /// present are appended at the end.
  pub fn save_with_overrides(&self, overrides: &HashMap<String, Vec<u8>>) -> HwpxResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
      let mut writer = ZipWriter::new(Cursor::new(&mut buf));
      let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

      let mut written = std::collections::HashSet::new();
      for name in &self.order {
        let data = overrides.get(name).map(Vec::as_slice).unwrap_or_else(|| &self.members[name]);
        writer.start_file(name, options)?;
        writer.write_all(data)?;
        written.insert(name.clone());
      }
      for (name, data) in overrides {
        if !written.contains(name) {
          writer.start_file(name, options)?;
          writer.write_all(data)?;
        }
      }
      writer.finish()?;
    }
    Ok(buf)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_archive() -> Vec<u8> {
    let mut buf = Vec::new();
    {
      let mut writer = ZipWriter::new(Cursor::new(&mut buf));
      let options = FileOptions::default().compression_method(CompressionMethod::Stored);
      writer.start_file("mimetype", options).unwrap();
      writer.write_all(b"application/hwp+zip").unwrap();
      writer.start_file("Contents/section0.xml", options).unwrap();
      writer.write_all(b"<hp:sec/>").unwrap();
      writer.finish().unwrap();
    }
    buf
  }

  #[test]
  fn round_trips_untouched_members() {
    let archive = sample_archive();
    let container = Container::open(&archive).unwrap();
    let out = container.save_with_overrides(&HashMap::new()).unwrap();
    let reopened = Container::open(&out).unwrap();
    assert_eq!(reopened.get("mimetype"), Some(&b"application/hwp+zip"[..]));
  }

  #[test]
  fn overrides_only_the_named_member() {
    let archive = sample_archive();
    let container = Container::open(&archive).unwrap();
    let mut overrides = HashMap::new();
    overrides.insert("Contents/section0.xml".to_string(), b"<hp:sec>new</hp:sec>".to_vec());
    let out = container.save_with_overrides(&overrides).unwrap();
    let reopened = Container::open(&out).unwrap();
    assert_eq!(reopened.get("Contents/section0.xml"), Some(&b"<hp:sec>new</hp:sec>"[..]));
    assert_eq!(reopened.get("mimetype"), Some(&b"application/hwp+zip"[..]));
  }
}
