//! Surgical mutators (spec §4.5): each function takes the raw bytes of one
//! XML part plus a located range and returns a brand new `Vec<u8>` for that
//! part, built as `preamble + patched-region + suffix` so every byte
//! outside the patched region is preserved identically to the input.

pub mod cell;
pub mod fields;
pub mod image;
pub mod nested_table;
pub mod shapes;
pub mod structure;
pub mod style_apply;
pub mod text;

/// Escapes the handful of characters XML text content must not contain raw,
/// used by every mutator that splices user-supplied text into a `<…:t>`
/// body.
pub(crate) fn escape_xml_text(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '\'' => out.push_str("&apos;"),
      '"' => out.push_str("&quot;"),
      other => out.push(other),
    }
  }
  out
}

/// Builds `xml[..start] + replacement + xml[end..]`. The one primitive every
/// mutator bottoms out in: never touch bytes outside `[start, end)`.
pub(crate) fn splice(xml: &[u8], start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(xml.len() - (end - start) + replacement.len());
  out.extend_from_slice(&xml[..start]);
  out.extend_from_slice(replacement);
  out.extend_from_slice(&xml[end..]);
  out
}

use crate::locator::{self, ElementRange};

fn extract_tag_name(xml: &[u8], outer_start: usize) -> String {
  let rest = &xml[outer_start + 1..];
  let end = rest
    .iter()
    .position(|&b| matches!(b, b' ' | b'/' | b'>' | b'\t' | b'\n' | b'\r'))
    .unwrap_or(rest.len());
  String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Splits a self-closing element's tag bytes into (`<tag attrs` with the
/// trailing `/>` stripped, local tag name including its namespace prefix)
/// so callers can rebuild it as an explicit open/body/close form.
pub(crate) fn split_self_closing(xml: &[u8], range: ElementRange) -> (String, String) {
  let tag_bytes = &xml[range.outer.0..range.outer.1];
  let open_end_rel = tag_bytes.len().saturating_sub(2); // strip trailing "/>"
  let open_tag = String::from_utf8_lossy(&tag_bytes[..open_end_rel]).into_owned();
  let tag_name = extract_tag_name(xml, range.outer.0);
  (open_tag, tag_name)
}

/// Rewrites a self-closing element into an explicit open/body/close form,
/// preserving its existing attributes, with `inner_content` as its new body.
pub(crate) fn expand_self_closing(xml: &[u8], range: ElementRange, inner_content: &str) -> Vec<u8> {
  let (open_tag, tag_name) = split_self_closing(xml, range);
  let replacement = format!("{}>{}</{}>", open_tag, inner_content, tag_name);
  splice(xml, range.outer.0, range.outer.1, replacement.as_bytes())
}

/// Like `expand_self_closing` but also upserts `attr_name` on the surviving
/// open tag, used when a self-closing element is expanded at the same time
/// one of its own attributes needs to change — doing both in one string
/// rebuild avoids re-splicing a region whose offsets the expansion moved.
pub(crate) fn expand_self_closing_with_attr(xml: &[u8], range: ElementRange, inner_content: &str, attr_name: &str, attr_value: &str) -> Vec<u8> {
  let (mut open_tag, tag_name) = split_self_closing(xml, range);
  match locator::find_attr_value_range(open_tag.as_bytes(), attr_name) {
    Some((s, e)) => open_tag.replace_range(s..e, attr_value),
    None => open_tag.push_str(&format!(" {}=\"{}\"", attr_name, attr_value)),
  }
  let replacement = format!("{}>{}</{}>", open_tag, inner_content, tag_name);
  splice(xml, range.outer.0, range.outer.1, replacement.as_bytes())
}
