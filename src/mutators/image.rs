//! Image insert (spec §4.5): sniffs the binary payload's format from its
//! header bytes, derives pixel dimensions where the format makes that easy,
//! and applies one of the caller's aspect-ratio modes before splicing a
//! `<hp:pic>` element referencing the stored binary item.

use crate::error::{HwpxError, HwpxResult};
use crate::locator;
use crate::mutators::splice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
  Png,
  Jpeg,
  Gif,
}

/// How the caller's requested width/height should be reconciled with the
/// image's natural aspect ratio (spec §4.5's four modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatioMode {
  /// Both width and height given: use them exactly, ignoring natural ratio.
  Stretch,
  /// Width given (height may also be given but is overridden): derive
  /// height from the natural ratio, width wins.
  LockWidth,
  /// Height given, width absent: derive width from the natural ratio.
  LockHeight,
  /// Neither given: use the natural pixel size, scaled to HWPUNIT and
  /// capped to `MAX_NATIVE_HWPUNIT` on its longer side, preserving ratio.
  NativeCapped,
}

/// Rough pixel-to-HWPUNIT scale used only for `NativeCapped` sizing, since
/// that is the one mode with no caller-given magnitude to anchor to.
const PIXEL_TO_HWPUNIT: i64 = 100;

/// Upper bound, in HWPUNIT, on the longer side of a `NativeCapped` insert.
pub const MAX_NATIVE_HWPUNIT: i64 = 600_00;

/// Sniffs `data`'s format from its magic header bytes.
pub fn sniff_format(data: &[u8]) -> HwpxResult<ImageFormat> {
  if data.len() >= 8 && &data[0..8] == b"\x89PNG\r\n\x1a\n" {
    Ok(ImageFormat::Png)
  } else if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
    Ok(ImageFormat::Jpeg)
  } else if data.len() >= 6 && (&data[0..6] == b"GIF87a" || &data[0..6] == b"GIF89a") {
    Ok(ImageFormat::Gif)
  } else {
    Err(HwpxError::InvalidXmlInput("unrecognized image header".into()))
  }
}

/// Reads the natural pixel dimensions from a PNG, GIF or JPEG header.
pub fn natural_dimensions(data: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
  match format {
    ImageFormat::Png if data.len() >= 24 => {
      let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
      let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
      Some((width, height))
    }
    ImageFormat::Gif if data.len() >= 10 => {
      let width = u16::from_le_bytes([data[6], data[7]]) as u32;
      let height = u16::from_le_bytes([data[8], data[9]]) as u32;
      Some((width, height))
    }
    ImageFormat::Jpeg => jpeg_dimensions(data),
    _ => None,
  }
}

/// Walks JPEG segments looking for a SOF0/1/2 marker (baseline or
/// progressive, non-differential), which carries the frame's pixel height
/// and width. Stops at the start-of-scan marker, since no header segment
/// ever follows it.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
  if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
    return None;
  }
  let mut pos = 2;
  while pos + 4 <= data.len() {
    if data[pos] != 0xFF {
      pos += 1;
      continue;
    }
    let marker = data[pos + 1];
    // standalone markers carry no length field
    if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) {
      pos += 2;
      continue;
    }
    if marker == 0xDA {
      break; // start of scan: no more header segments follow
    }
    let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
    let is_sof = matches!(marker, 0xC0 | 0xC1 | 0xC2);
    if is_sof {
      if pos + 9 > data.len() {
        return None;
      }
      let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
      let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]) as u32;
      return Some((width, height));
    }
    if seg_len < 2 {
      return None;
    }
    pos += 2 + seg_len;
  }
  None
}

fn cap_to_max(natural: (u32, u32)) -> (i64, i64) {
  let w = natural.0 as i64 * PIXEL_TO_HWPUNIT;
  let h = natural.1 as i64 * PIXEL_TO_HWPUNIT;
  let longer = w.max(h);
  if longer <= MAX_NATIVE_HWPUNIT {
    return (w, h);
  }
  let scale = MAX_NATIVE_HWPUNIT as f64 / longer as f64;
  ((w as f64 * scale).round() as i64, (h as f64 * scale).round() as i64)
}

/// Resolves a (width, height) in HWPUNIT for the inserted picture, honoring
/// `mode` against the natural dimensions when known. `requested_width`/
/// `requested_height` are `None` exactly when the caller omitted that
/// dimension; `LockWidth`/`LockHeight`/`Stretch` still need the dimension(s)
/// they lock to be present, and `NativeCapped` needs the natural size.
pub fn resolve_size(
  requested_width: Option<i64>,
  requested_height: Option<i64>,
  natural: Option<(u32, u32)>,
  mode: AspectRatioMode,
) -> HwpxResult<(i64, i64)> {
  match mode {
    AspectRatioMode::Stretch => {
      let w = requested_width.ok_or_else(|| HwpxError::StructuralAnomaly("stretch mode requires a width".into()))?;
      let h = requested_height.ok_or_else(|| HwpxError::StructuralAnomaly("stretch mode requires a height".into()))?;
      Ok((w, h))
    }
    AspectRatioMode::LockWidth => {
      let w = requested_width.ok_or_else(|| HwpxError::StructuralAnomaly("lock-width mode requires a width".into()))?;
      match natural {
        Some(n) => Ok((w, (w as f64 * n.1 as f64 / n.0 as f64).round() as i64)),
        None => Ok((w, requested_height.unwrap_or(w))),
      }
    }
    AspectRatioMode::LockHeight => {
      let h = requested_height.ok_or_else(|| HwpxError::StructuralAnomaly("lock-height mode requires a height".into()))?;
      match natural {
        Some(n) => Ok(((h as f64 * n.0 as f64 / n.1 as f64).round() as i64, h)),
        None => Ok((requested_width.unwrap_or(h), h)),
      }
    }
    AspectRatioMode::NativeCapped => {
      let n = natural.ok_or_else(|| HwpxError::StructuralAnomaly("native dimensions unavailable for this format".into()))?;
      Ok(cap_to_max(n))
    }
  }
}

/// Inserts a `<hp:pic>` element referencing `bin_item_id` as the first
/// child of the section's element list at `insert_after_index` (or at the
/// front if `None`), sized per `width_hwpunit`/`height_hwpunit`.
pub fn apply_image_insert(
  section_xml: &[u8],
  pic_id: u32,
  bin_item_id: &str,
  width_hwpunit: i64,
  height_hwpunit: i64,
  insert_after_paragraph_id: Option<u32>,
) -> HwpxResult<Vec<u8>> {
  let element = format!(
    r#"<hp:p><hp:run><hp:pic id="{}" binItemIDRef="{}"><hp:sz width="{}" height="{}"/></hp:pic></hp:run></hp:p>"#,
    pic_id, bin_item_id, width_hwpunit, height_hwpunit
  );

  let insert_at = match insert_after_paragraph_id {
    Some(id) => {
      let range = locator::find_by_id(section_xml, "p", "id", &id.to_string())
        .ok_or_else(|| HwpxError::NotFound("paragraph".into(), id.to_string()))?;
      range.outer.1
    }
    None => 0,
  };

  Ok(splice(section_xml, insert_at, insert_at, element.as_bytes()))
}
