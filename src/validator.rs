//! Structural validation of a raw XML part (spec §4.2): tag-balance
//! checking and orphan-closer discovery, run both before trusting a located
//! range and after a splice to confirm the part is still well-formed.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::HwpxError;
use crate::utils::local_name;

/// Result of a tag-balance pass over one local tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceReport {
  pub opens: usize,
  pub closes: usize,
}

impl BalanceReport {
  pub fn is_balanced(&self) -> bool {
    self.opens == self.closes
  }
}

/// Counts open/close events for `tag_local`, counting a self-closing tag as
/// one open and one close.
pub fn check_balance(xml: &[u8], tag_local: &str) -> BalanceReport {
  let wanted = tag_local.as_bytes();
  let mut reader = Reader::from_reader(xml);
  reader.check_end_names(false);
  let mut report = BalanceReport::default();
  let mut buf = Vec::new();
  loop {
    match reader.read_event(&mut buf) {
      Ok(Event::Start(ref e)) if local_name(e.name()) == wanted => report.opens += 1,
      Ok(Event::End(ref e)) if local_name(e.name()) == wanted => report.closes += 1,
      Ok(Event::Empty(ref e)) if local_name(e.name()) == wanted => {
        report.opens += 1;
        report.closes += 1;
      }
      Ok(Event::Eof) => break,
      Err(_) => break,
      _ => {}
    }
    buf.clear();
  }
  report
}

/// Returns an error if `tag_local` is unbalanced in `xml`.
pub fn require_balanced(xml: &[u8], tag_local: &str) -> Result<(), HwpxError> {
  let report = check_balance(xml, tag_local);
  if report.is_balanced() {
    Ok(())
  } else {
    Err(HwpxError::TagImbalance(
      tag_local.to_string(),
      report.opens,
      report.closes,
    ))
  }
}

/// Minimum plausible length for a non-empty section part: even an empty
/// `<hp:sec/>` skeleton is longer than this.
const MIN_STRUCTURAL_LENGTH: usize = 8;

/// Structural check run ahead of tag-balance checking (spec §4.2): catches
/// inputs that are not XML at all, rather than letting a zero-tag-count
/// balance check wave them through. Checks, in order: minimum length,
/// starts with `<` (declaration or element), not truncated (ends with `>`),
/// and no broken-opening `<...<` sequence.
pub fn check_structure(xml: &[u8]) -> Result<(), String> {
  if xml.len() < MIN_STRUCTURAL_LENGTH {
    return Err("missing section root element: input too short to contain one".to_string());
  }
  let first_non_ws = xml.iter().position(|b| !b.is_ascii_whitespace());
  match first_non_ws {
    Some(pos) if xml[pos] == b'<' => {}
    _ => return Err("missing section root element: input does not begin with '<'".to_string()),
  }
  let last_non_ws = xml.iter().rposition(|b| !b.is_ascii_whitespace());
  match last_non_ws {
    Some(pos) if xml[pos] == b'>' => {}
    _ => return Err("missing section root element: input is truncated before a closing '>'".to_string()),
  }
  if has_broken_opening_tag(xml) {
    return Err("missing section root element: broken opening tag (a '<' appears before the prior tag was closed)".to_string());
  }
  Ok(())
}

/// True if a `<` appears while still inside an already-opened tag, i.e. no
/// `>` closed it first. A bare `<` inside text content is legal XML-wise
/// only when escaped as `&lt;`, which never contains a literal `<` byte, so
/// any literal `<` seen before the in-tag `>` is a genuine break.
fn has_broken_opening_tag(xml: &[u8]) -> bool {
  let mut in_tag = false;
  for &b in xml {
    match b {
      b'<' if in_tag => return true,
      b'<' => in_tag = true,
      b'>' => in_tag = false,
      _ => {}
    }
  }
  false
}

/// Scans for the literal byte pattern `<...<` (an unescaped `<` where text
/// content was expected), one of the universal invariants a splice must
/// never introduce.
pub fn find_bare_left_angle_in_text(xml: &[u8]) -> Option<usize> {
  let mut reader = Reader::from_reader(xml);
  reader.check_end_names(false);
  let mut buf = Vec::new();
  loop {
    let pos = reader.buffer_position();
    match reader.read_event(&mut buf) {
      Ok(Event::Text(ref t)) => {
        if memchr::memchr(b'<', t.escaped()).is_some() {
          return Some(pos);
        }
      }
      Ok(Event::Eof) => break,
      Err(_) => break,
      _ => {}
    }
    buf.clear();
  }
  None
}

/// Finds end tags of `tag_local` with no matching, still-open start tag:
/// these "orphan closers" indicate a prior splice went wrong. Non-fatal by
/// itself; the caller decides whether to surface, skip, or roll back.
pub fn find_orphan_closers(xml: &[u8], tag_local: &str) -> Vec<usize> {
  let wanted = tag_local.as_bytes();
  let mut reader = Reader::from_reader(xml);
  reader.check_end_names(false);
  let mut depth = 0i64;
  let mut orphans = Vec::new();
  let mut buf = Vec::new();
  loop {
    let pos = reader.buffer_position();
    match reader.read_event(&mut buf) {
      Ok(Event::Start(ref e)) if local_name(e.name()) == wanted => depth += 1,
      Ok(Event::End(ref e)) if local_name(e.name()) == wanted => {
        if depth == 0 {
          orphans.push(pos);
        } else {
          depth -= 1;
        }
      }
      Ok(Event::Eof) => break,
      Err(_) => break,
      _ => {}
    }
    buf.clear();
  }
  orphans
}

/// Removes every orphan closer of `tag_local` found by
/// `find_orphan_closers`, the on-demand repair spec §7 allows but does not
/// run automatically. Byte offsets are removed back-to-front so earlier
/// removals never shift a later one's still-pending position.
pub fn repair_orphan_closers(xml: &[u8], tag_local: &str) -> Vec<u8> {
  let wanted_len = format!("</{}", tag_local).len(); // lower bound; real tag may carry a namespace prefix
  let mut orphans = find_orphan_closers(xml, tag_local);
  orphans.sort_unstable_by(|a, b| b.cmp(a));
  let mut out = xml.to_vec();
  for pos in orphans {
    // `pos` is the reader's position just after the end tag; scan back to
    // the matching '<' to find the closer's start.
    let start = match memchr::memrchr(b'<', &out[..pos]) {
      Some(s) => s,
      None => continue,
    };
    if pos - start < wanted_len {
      continue;
    }
    out = crate::mutators::splice(&out, start, pos, b"");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repair_removes_every_orphan_closer() {
    let xml = br#"<hp:p></hp:tbl><hp:t>x</hp:t></hp:tbl></hp:p>"#;
    let repaired = repair_orphan_closers(xml, "tbl");
    assert!(find_orphan_closers(&repaired, "tbl").is_empty());
    assert!(String::from_utf8(repaired).unwrap().contains("<hp:t>x</hp:t>"));
  }

  #[test]
  fn balanced_table_reports_equal_counts() {
    let xml = br#"<hp:tbl><hp:tr><hp:tc/></hp:tr></hp:tbl>"#;
    let report = check_balance(xml, "tbl");
    assert!(report.is_balanced());
    assert_eq!(report.opens, 1);
  }

  #[test]
  fn unbalanced_table_is_rejected() {
    let xml = br#"<hp:tbl><hp:tr></hp:tbl>"#;
    assert!(require_balanced(xml, "tr").is_err());
  }

  #[test]
  fn detects_orphan_closer() {
    let xml = br#"<hp:p></hp:tbl></hp:p>"#;
    let orphans = find_orphan_closers(xml, "tbl");
    assert_eq!(orphans.len(), 1);
  }

  #[test]
  fn non_xml_input_fails_structure_check_with_named_reason() {
    let err = check_structure(b"This is not XML at all").unwrap_err();
    assert!(err.contains("missing section root element"));
  }

  #[test]
  fn well_formed_section_passes_structure_check() {
    assert!(check_structure(br#"<hp:sec><hp:p id="1"/></hp:sec>"#).is_ok());
  }

  #[test]
  fn truncated_input_fails_structure_check() {
    let err = check_structure(b"<hp:sec><hp:p id=\"1\"").unwrap_err();
    assert!(err.contains("missing section root element"));
  }

  #[test]
  fn broken_opening_tag_fails_structure_check() {
    let err = check_structure(b"<hp:sec><hp:p<hp:t>x</hp:t></hp:p></hp:sec>").unwrap_err();
    assert!(err.contains("missing section root element"));
  }

  #[test]
  fn too_short_input_fails_structure_check() {
    let err = check_structure(b"<a/>").unwrap_err();
    assert!(err.contains("missing section root element"));
  }
}
