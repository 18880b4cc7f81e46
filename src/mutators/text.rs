//! Direct text update and regex-anchored text replacement (spec §4.5).
//! Both only ever touch the inner byte range of a `<…:t>` run-text node,
//! never the surrounding run/paragraph structure.

use regex::Regex;

use crate::error::{HwpxError, HwpxResult};
use crate::locator;
use crate::mutators::{escape_xml_text, splice};

/// Replaces the text of the `run_index`-th run in the paragraph identified
/// by `paragraph_id`, leaving every other run and the paragraph's own
/// attributes untouched.
pub fn apply_direct_text_update(
  xml: &[u8],
  paragraph_id: u32,
  run_index: usize,
  new_text: &str,
) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  let text_elem = locator::find_nth_within(xml, run.inner, "t", 0)
    .ok_or_else(|| HwpxError::StructuralAnomaly("run has no <t> text node".into()))?;
  Ok(splice(
    xml,
    text_elem.inner.0,
    text_elem.inner.1,
    escape_xml_text(new_text).as_bytes(),
  ))
}

/// Builds the regex to search with: a literal pattern is escaped before
/// compiling so `is_regex == false` can never be tricked into running an
/// attacker/caller-supplied pattern as a regex; case-insensitivity is a
/// leading `(?i)` rather than a separate code path.
fn build_regex(pattern: &str, is_regex: bool, case_sensitive: bool) -> HwpxResult<Regex> {
  let body = if is_regex { pattern.to_string() } else { regex::escape(pattern) };
  let full = if case_sensitive { body } else { format!("(?i){}", body) };
  Regex::new(&full).map_err(|e| HwpxError::InvalidXmlInput(e.to_string()))
}

/// Applies `regex` to every (non-self-closing) `<…:t>` text node within
/// `region`, back-to-front so earlier splices never invalidate a later
/// one's still-pending byte offsets.
fn replace_in_region(xml: &[u8], region: (usize, usize), regex: &Regex, replacement: &str) -> Vec<u8> {
  let mut text_nodes = locator::find_all(&xml[region.0..region.1], "t")
    .into_iter()
    .map(|r| locator::ElementRange {
      outer: (r.outer.0 + region.0, r.outer.1 + region.0),
      inner: (r.inner.0 + region.0, r.inner.1 + region.0),
      depth: r.depth,
      self_closing: r.self_closing,
    })
    .collect::<Vec<_>>();

  text_nodes.sort_by_key(|r| std::cmp::Reverse(r.inner.0));

  let mut out = xml.to_vec();
  for node in text_nodes {
    if node.self_closing {
      continue;
    }
    let current = match std::str::from_utf8(&out[node.inner.0..node.inner.1]) {
      Ok(s) => s,
      Err(_) => continue,
    };
    if !regex.is_match(current) {
      continue;
    }
    let replaced = regex.replace_all(current, replacement).into_owned();
    out = splice(&out, node.inner.0, node.inner.1, escape_xml_text(&replaced).as_bytes());
  }
  out
}

/// True if byte offset `pos` falls inside any of `tables`.
fn in_any_table(pos: usize, tables: &[locator::ElementRange]) -> bool {
  tables.iter().any(|t| pos >= t.outer.0 && pos < t.outer.1)
}

/// Applies a find/replace across every `<…:t>` text node in `xml`. Matches
/// never cross a text-node boundary: the search runs once per node, not
/// over the whole document.
///
/// - `is_regex`: when `false`, `pattern` is matched literally (escaped
///   before compiling) rather than as a regular expression.
/// - `case_sensitive`: when `false`, matching ignores ASCII/Unicode case.
/// - `cell_scope`: when given, restricts the search to the single
///   `(table_id, row, col)` cell named, taking precedence over
///   `include_tables`/`exclude_tables`.
/// - `include_tables`/`exclude_tables`: when `cell_scope` is absent, scope
///   the search to only the listed table ids (`include_tables`) and/or
///   away from the listed ones (`exclude_tables`); both may be combined,
///   exclude always wins for a table that is in both lists.
#[allow(clippy::too_many_arguments)]
pub fn apply_text_replacement(
  xml: &[u8],
  pattern: &str,
  replacement: &str,
  is_regex: bool,
  case_sensitive: bool,
  cell_scope: Option<(u32, u32, u32)>,
  include_tables: Option<&[u32]>,
  exclude_tables: &[u32],
) -> HwpxResult<Vec<u8>> {
  let regex = build_regex(pattern, is_regex, case_sensitive)?;

  if let Some((table_id, row, col)) = cell_scope {
    let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
    let tr = locator::find_nth_within(xml, table.outer, "tr", row as usize)
      .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} has no row {}", table_id, row)))?;
    let tc = locator::find_nth_within(xml, tr.outer, "tc", col as usize).ok_or_else(|| {
      HwpxError::StructuralAnomaly(format!("table {} row {} has no column {}", table_id, row, col))
    })?;
    return Ok(replace_in_region(xml, tc.inner, &regex, replacement));
  }

  if include_tables.is_none() && exclude_tables.is_empty() {
    return Ok(replace_in_region(xml, (0, xml.len()), &regex, replacement));
  }

  let all_tables = locator::find_all(xml, "tbl");
  let included: Vec<locator::ElementRange> = match include_tables {
    Some(ids) => all_tables
      .iter()
      .filter(|t| match locator::attr_value(xml, **t, "id") {
        Some(id) => id.parse::<u32>().map(|n| ids.contains(&n)).unwrap_or(false),
        None => false,
      })
      .copied()
      .collect(),
    None => all_tables.clone(),
  };
  let excluded: Vec<locator::ElementRange> = all_tables
    .iter()
    .filter(|t| match locator::attr_value(xml, **t, "id") {
      Some(id) => id.parse::<u32>().map(|n| exclude_tables.contains(&n)).unwrap_or(false),
      None => false,
    })
    .copied()
    .collect();

  let out_of_scope_tables: Vec<locator::ElementRange> = match include_tables {
    Some(_) => all_tables
      .iter()
      .filter(|t| !included.iter().any(|i| i.outer == t.outer) || excluded.iter().any(|e| e.outer == t.outer))
      .copied()
      .collect(),
    None => excluded.clone(),
  };

  let mut text_nodes = locator::find_all(xml, "t");
  text_nodes.sort_by_key(|r| std::cmp::Reverse(r.inner.0));

  let mut out = xml.to_vec();
  for node in text_nodes {
    if node.self_closing {
      continue;
    }
    if in_any_table(node.outer.0, &out_of_scope_tables) {
      continue;
    }
    let current = match std::str::from_utf8(&out[node.inner.0..node.inner.1]) {
      Ok(s) => s,
      Err(_) => continue,
    };
    if !regex.is_match(current) {
      continue;
    }
    let replaced = regex.replace_all(current, replacement).into_owned();
    out = splice(&out, node.inner.0, node.inner.1, escape_xml_text(&replaced).as_bytes());
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn direct_update_replaces_one_run_only() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run><hp:run><hp:t>b</hp:t></hp:run></hp:p>"#;
    let patched = apply_direct_text_update(xml, 1, 1, "B").unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert!(text.contains("<hp:t>a</hp:t>"));
    assert!(text.contains("<hp:t>B</hp:t>"));
  }

  #[test]
  fn replacement_touches_every_matching_text_node() {
    let xml = br#"<hp:p><hp:run><hp:t>foo bar</hp:t></hp:run></hp:p><hp:p><hp:run><hp:t>foo baz</hp:t></hp:run></hp:p>"#;
    let patched = apply_text_replacement(xml, "foo", "qux", true, true, None, None, &[]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert_eq!(text.matches("qux").count(), 2);
  }

  #[test]
  fn scoped_replacement_only_touches_named_cell() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc></hp:tr></hp:tbl>"#;
    let patched = apply_text_replacement(xml, "foo", "bar", true, true, Some((1, 0, 0)), None, &[]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert_eq!(text.matches("bar").count(), 1);
    assert_eq!(text.matches("foo").count(), 1);
  }

  #[test]
  fn literal_pattern_is_not_treated_as_regex() {
    let xml = br#"<hp:p><hp:run><hp:t>a.b</hp:t></hp:run></hp:p><hp:p><hp:run><hp:t>axb</hp:t></hp:run></hp:p>"#;
    let patched = apply_text_replacement(xml, "a.b", "Z", false, true, None, None, &[]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert_eq!(text.matches('Z').count(), 1);
  }

  #[test]
  fn case_insensitive_match_ignores_case() {
    let xml = br#"<hp:p><hp:run><hp:t>FOO</hp:t></hp:run></hp:p>"#;
    let patched = apply_text_replacement(xml, "foo", "bar", false, false, None, None, &[]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert!(text.contains("<hp:t>bar</hp:t>"));
  }

  #[test]
  fn include_tables_restricts_to_listed_table_ids() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc></hp:tr></hp:tbl><hp:tbl id="2"><hp:tr><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc></hp:tr></hp:tbl>"#;
    let patched = apply_text_replacement(xml, "foo", "bar", true, true, None, Some(&[1]), &[]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert_eq!(text.matches("bar").count(), 1);
    assert_eq!(text.matches("foo").count(), 1);
  }

  #[test]
  fn exclude_tables_skips_listed_table_ids() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc></hp:tr></hp:tbl><hp:tbl id="2"><hp:tr><hp:tc><hp:run><hp:t>foo</hp:t></hp:run></hp:tc></hp:tr></hp:tbl>"#;
    let patched = apply_text_replacement(xml, "foo", "bar", true, true, None, None, &[1]).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert_eq!(text.matches("bar").count(), 1);
    assert_eq!(text.matches("foo").count(), 1);
  }
}
