//! Character/paragraph/named style application (spec §4.4 "styled
//! overlays" and paragraph verbs). Each rewrites (or inserts) a single
//! `*IDRef` attribute on the target element and otherwise leaves the
//! element's children untouched, the same upsert-an-attribute technique
//! `mutators::cell::upsert_char_pr_id_ref` uses for cell text updates.

use crate::error::{HwpxError, HwpxResult};
use crate::locator::{self, ElementRange};
use crate::mutators::splice;

fn upsert_attr(xml: &[u8], range: ElementRange, attr: &str, value: &str) -> Vec<u8> {
  let tag_end = if range.self_closing { range.outer.1 } else { range.inner.0 };
  let tag_bytes = &xml[range.outer.0..tag_end];
  match locator::find_attr_value_range(tag_bytes, attr) {
    Some((s, e)) => splice(xml, range.outer.0 + s, range.outer.0 + e, value.as_bytes()),
    None => {
      let name_end = range.outer.0
        + memchr::memchr(b' ', tag_bytes).unwrap_or(tag_bytes.len().saturating_sub(if range.self_closing { 2 } else { 1 }));
      let fragment = format!(" {}=\"{}\"", attr, value);
      splice(xml, name_end, name_end, fragment.as_bytes())
    }
  }
}

/// Rewrites the `charPrIDRef` of the `run_index`-th run in paragraph
/// `paragraph_id`.
pub fn apply_character_style(xml: &[u8], paragraph_id: u32, run_index: usize, char_pr_id_ref: u32) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  Ok(upsert_attr(xml, run, "charPrIDRef", &char_pr_id_ref.to_string()))
}

/// Rewrites the `paraPrIDRef` of paragraph `paragraph_id`.
pub fn apply_paragraph_style(xml: &[u8], paragraph_id: u32, para_pr_id_ref: u32) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  Ok(upsert_attr(xml, paragraph, "paraPrIDRef", &para_pr_id_ref.to_string()))
}

/// Rewrites the `styleIDRef` of paragraph `paragraph_id`.
pub fn apply_named_style(xml: &[u8], paragraph_id: u32, style_id_ref: u32) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  Ok(upsert_attr(xml, paragraph, "styleIDRef", &style_id_ref.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn character_style_rewrites_existing_attribute() {
    let xml = br#"<hp:p id="1"><hp:run charPrIDRef="1"><hp:t>a</hp:t></hp:run></hp:p>"#;
    let patched = apply_character_style(xml, 1, 0, 9).unwrap();
    assert!(String::from_utf8(patched).unwrap().contains(r#"charPrIDRef="9""#));
  }

  #[test]
  fn character_style_inserts_attribute_when_absent() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let patched = apply_character_style(xml, 1, 0, 9).unwrap();
    assert!(String::from_utf8(patched).unwrap().contains(r#"charPrIDRef="9""#));
  }

  #[test]
  fn paragraph_style_rewrites_para_pr_id_ref() {
    let xml = br#"<hp:p id="1" paraPrIDRef="2"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let patched = apply_paragraph_style(xml, 1, 5).unwrap();
    assert!(String::from_utf8(patched).unwrap().contains(r#"paraPrIDRef="5""#));
  }

  #[test]
  fn named_style_sets_style_id_ref() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let patched = apply_named_style(xml, 1, 3).unwrap();
    assert!(String::from_utf8(patched).unwrap().contains(r#"styleIDRef="3""#));
  }

  #[test]
  fn missing_paragraph_is_not_found() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    assert!(apply_paragraph_style(xml, 99, 1).is_err());
  }
}
