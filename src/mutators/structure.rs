//! Row/column/cell-property structural mutators (spec §4.4 table verbs).
//! These do not appear in the mutation-log variant list of §4.3 — they
//! splice the section's raw XML directly, the same way the facade's other
//! non-logged structural verbs (paragraph insert/delete) do.

use crate::error::{HwpxError, HwpxResult};
use crate::locator;
use crate::mutators::splice;

fn cell_template(col_addr: u32, row_addr: u32, width_hwpunit: i64) -> String {
  format!(
    r#"<hp:tc><hp:cellAddr colAddr="{}" rowAddr="{}"/><hp:cellSz width="{}"/><hp:subList><hp:p><hp:run><hp:t></hp:t></hp:run></hp:p></hp:subList></hp:tc>"#,
    col_addr, row_addr, width_hwpunit
  )
}

/// Inserts a fresh row of `col_count` empty cells at `at_row` (0-based,
/// existing rows at or after that index shift down). `rowCnt` is bumped.
pub fn apply_insert_row(xml: &[u8], table_id: u32, at_row: u32, col_count: u32, width_hwpunit: i64) -> HwpxResult<Vec<u8>> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let rows = locator::find_all(&xml[table.outer.0..table.outer.1], "tr");
  let insert_at = rows
    .get(at_row as usize)
    .map(|r| r.outer.0 + table.outer.0)
    .unwrap_or(table.inner.1);

  let mut row_xml = String::from("<hp:tr>");
  for c in 0..col_count {
    row_xml.push_str(&cell_template(c, at_row, width_hwpunit));
  }
  row_xml.push_str("</hp:tr>");

  let patched = splice(xml, insert_at, insert_at, row_xml.as_bytes());
  Ok(bump_row_count(&patched, table_id, 1))
}

/// Removes the `row`-th row wholesale. `rowCnt` is decremented.
pub fn apply_delete_row(xml: &[u8], table_id: u32, row: u32) -> HwpxResult<Vec<u8>> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let tr = locator::find_nth_within(xml, table.outer, "tr", row as usize)
    .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} has no row {}", table_id, row)))?;
  let patched = splice(xml, tr.outer.0, tr.outer.1, b"");
  Ok(bump_row_count(&patched, table_id, -1))
}

/// Inserts one new cell at `at_col` into every row. `colCnt` is bumped.
pub fn apply_insert_column(xml: &[u8], table_id: u32, at_col: u32, width_hwpunit: i64) -> HwpxResult<Vec<u8>> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let row_ranges = locator::find_all(&xml[table.outer.0..table.outer.1], "tr")
    .into_iter()
    .map(|r| (r.outer.0 + table.outer.0, r.outer.1 + table.outer.0))
    .collect::<Vec<_>>();

  let mut out = xml.to_vec();
  // back-to-front so earlier splices in later rows don't shift earlier rows'
  // still-pending offsets.
  for (row_index, (row_start, row_end)) in row_ranges.iter().enumerate().rev() {
    let cells = locator::find_all(&out[*row_start..*row_end], "tc");
    let insert_at = cells
      .get(at_col as usize)
      .map(|c| c.outer.0 + row_start)
      .unwrap_or(row_end - "</hp:tr>".len());
    let cell_xml = cell_template(at_col, row_index as u32, width_hwpunit);
    out = splice(&out, insert_at, insert_at, cell_xml.as_bytes());
  }
  Ok(bump_col_count(&out, table_id, 1))
}

/// Removes the `col`-th cell from every row. `colCnt` is decremented.
pub fn apply_delete_column(xml: &[u8], table_id: u32, col: u32) -> HwpxResult<Vec<u8>> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let row_ranges = locator::find_all(&xml[table.outer.0..table.outer.1], "tr")
    .into_iter()
    .map(|r| (r.outer.0 + table.outer.0, r.outer.1 + table.outer.0))
    .collect::<Vec<_>>();

  let mut out = xml.to_vec();
  for (row_start, row_end) in row_ranges.iter().rev() {
    let cells = locator::find_all(&out[*row_start..*row_end], "tc");
    if let Some(cell) = cells.get(col as usize) {
      let start = cell.outer.0 + row_start;
      let end = cell.outer.1 + row_start;
      out = splice(&out, start, end, b"");
    }
  }
  Ok(bump_col_count(&out, table_id, -1))
}

/// Overrides the declared width of the cell at `(row, col)`, used by
/// `set_cell_properties`. Leaves everything else in the cell untouched.
pub fn apply_set_cell_width(xml: &[u8], table_id: u32, row: u32, col: u32, width_hwpunit: i64) -> HwpxResult<Vec<u8>> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let tr = locator::find_nth_within(xml, table.outer, "tr", row as usize)
    .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} has no row {}", table_id, row)))?;
  let tc = locator::find_nth_within(xml, tr.outer, "tc", col as usize)
    .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} row {} has no column {}", table_id, row, col)))?;

  match locator::find_nth_within(xml, tc.inner, "cellSz", 0) {
    Some(sz) => {
      let tag_bytes = &xml[sz.outer.0..sz.outer.1];
      match locator::find_attr_value_range(tag_bytes, "width") {
        Some((s, e)) => Ok(splice(xml, sz.outer.0 + s, sz.outer.0 + e, width_hwpunit.to_string().as_bytes())),
        None => Err(HwpxError::StructuralAnomaly("cellSz has no width attribute".into())),
      }
    }
    None => {
      let fragment = format!(r#"<hp:cellSz width="{}"/>"#, width_hwpunit);
      Ok(splice(xml, tc.inner.0, tc.inner.0, fragment.as_bytes()))
    }
  }
}

fn bump_row_count(xml: &[u8], table_id: u32, delta: i64) -> Vec<u8> {
  bump_count_attr(xml, table_id, "rowCnt", delta)
}

fn bump_col_count(xml: &[u8], table_id: u32, delta: i64) -> Vec<u8> {
  bump_count_attr(xml, table_id, "colCnt", delta)
}

fn bump_count_attr(xml: &[u8], table_id: u32, attr: &str, delta: i64) -> Vec<u8> {
  let table = match locator::find_by_id(xml, "tbl", "id", &table_id.to_string()) {
    Some(t) => t,
    None => return xml.to_vec(),
  };
  let tag_end = if table.self_closing { table.outer.1 } else { table.inner.0 };
  let tag_bytes = &xml[table.outer.0..tag_end];
  match locator::find_attr_value_range(tag_bytes, attr) {
    Some((s, e)) => {
      let current: i64 = std::str::from_utf8(&xml[table.outer.0 + s..table.outer.0 + e])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
      let updated = (current + delta).max(0);
      splice(xml, table.outer.0 + s, table.outer.0 + e, updated.to_string().as_bytes())
    }
    None => xml.to_vec(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &[u8] = br#"<hp:tbl id="1" rowCnt="1" colCnt="2"><hp:tr><hp:tc><hp:t>a</hp:t></hp:tc><hp:tc><hp:t>b</hp:t></hp:tc></hp:tr></hp:tbl>"#;

  #[test]
  fn insert_row_adds_a_row_and_bumps_count() {
    let patched = apply_insert_row(SAMPLE, 1, 1, 2, 1000).unwrap();
    assert_eq!(locator::find_all(&patched, "tr").len(), 2);
    let table = locator::find_by_id(&patched, "tbl", "id", "1").unwrap();
    assert_eq!(locator::attr_value(&patched, table, "rowCnt").as_deref(), Some("2"));
  }

  #[test]
  fn delete_row_removes_it_and_decrements_count() {
    let patched = apply_delete_row(SAMPLE, 1, 0).unwrap();
    assert_eq!(locator::find_all(&patched, "tr").len(), 0);
    let table = locator::find_by_id(&patched, "tbl", "id", "1").unwrap();
    assert_eq!(locator::attr_value(&patched, table, "rowCnt").as_deref(), Some("0"));
  }

  #[test]
  fn insert_column_adds_a_cell_to_every_row() {
    let patched = apply_insert_column(SAMPLE, 1, 0, 500).unwrap();
    assert_eq!(locator::find_all(&patched, "tc").len(), 3);
    let table = locator::find_by_id(&patched, "tbl", "id", "1").unwrap();
    assert_eq!(locator::attr_value(&patched, table, "colCnt").as_deref(), Some("3"));
  }

  #[test]
  fn delete_column_removes_one_cell_per_row() {
    let patched = apply_delete_column(SAMPLE, 1, 0).unwrap();
    assert_eq!(locator::find_all(&patched, "tc").len(), 1);
  }

  #[test]
  fn set_cell_width_inserts_cell_sz_when_absent() {
    let patched = apply_set_cell_width(SAMPLE, 1, 0, 0, 2000).unwrap();
    let text = String::from_utf8(patched).unwrap();
    assert!(text.contains(r#"<hp:cellSz width="2000"/>"#));
  }
}
