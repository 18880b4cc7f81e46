//! Nested-table insert (spec §4.5): synthesizes a fresh `<hp:tbl>` subtree
//! inside a target cell, minting a brand-new, collision-free ID for the
//! inserted table (and any tables nested inside the template itself).

use crate::error::{HwpxError, HwpxResult};
use crate::id_gen::IdGenerator;
use crate::locator;
use crate::mutators::{expand_self_closing, splice};

/// Builds the raw XML template for a `rows` x `cols` empty table with the
/// given `table_id`.
pub fn synthesize_table_template(table_id: u32, rows: u32, cols: u32) -> String {
  let mut xml = format!(
    r#"<hp:tbl id="{}" rowCnt="{}" colCnt="{}">"#,
    table_id, rows, cols
  );
  for r in 0..rows {
    xml.push_str("<hp:tr>");
    for c in 0..cols {
      xml.push_str(&format!(
        r#"<hp:tc><hp:cellAddr colAddr="{}" rowAddr="{}"/><hp:p><hp:run><hp:t></hp:t></hp:run></hp:p></hp:tc>"#,
        c, r
      ));
    }
    xml.push_str("</hp:tr>");
  }
  xml.push_str("</hp:tbl>");
  xml
}

/// Inserts a fresh `rows` x `cols` table into the cell at `(row, col)` of
/// the parent table. The new table's ID is minted by `id_gen`, never
/// reused from anywhere else in the document.
pub fn apply_nested_table_insert(
  xml: &[u8],
  parent_table_id: u32,
  row: u32,
  col: u32,
  rows: u32,
  cols: u32,
  id_gen: &mut IdGenerator,
) -> HwpxResult<(Vec<u8>, u32)> {
  let new_id = id_gen.next_id();
  let patched = apply_nested_table_insert_with_id(xml, parent_table_id, row, col, rows, cols, new_id)?;
  Ok((patched, new_id))
}

/// Like `apply_nested_table_insert` but takes the new table's ID directly
/// rather than minting it, so the save pipeline can replay a logged
/// `NestedTableInsert` entry and reproduce byte-identical output without a
/// second, differently-seeded `IdGenerator`.
///
/// Per spec §4.5, the inserted table becomes the target cell's last
/// paragraph extended with a new run whose body is the sub-table. A cell
/// with no paragraph at all (the degenerate case, e.g. freshly synthesized
/// structural rows) falls back to splicing the bare `<hp:tbl>` in as a
/// sibling at the end of the cell's content.
pub fn apply_nested_table_insert_with_id(
  xml: &[u8],
  parent_table_id: u32,
  row: u32,
  col: u32,
  rows: u32,
  cols: u32,
  new_id: u32,
) -> HwpxResult<Vec<u8>> {
  let parent = locator::find_by_id(xml, "tbl", "id", &parent_table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), parent_table_id.to_string()))?;
  let tr = locator::find_nth_within(xml, parent.outer, "tr", row as usize).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("table {} has no row {}", parent_table_id, row))
  })?;
  let tc = locator::find_nth_within(xml, tr.outer, "tc", col as usize).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!(
      "table {} row {} has no column {}",
      parent_table_id, row, col
    ))
  })?;

  let template = synthesize_table_template(new_id, rows, cols);
  let run = format!("<hp:run>{}</hp:run>", template);

  let last_paragraph = locator::find_all(&xml[tc.inner.0..tc.inner.1], "p")
    .into_iter()
    .last()
    .map(|r| locator::ElementRange {
      outer: (r.outer.0 + tc.inner.0, r.outer.1 + tc.inner.0),
      inner: (r.inner.0 + tc.inner.0, r.inner.1 + tc.inner.0),
      depth: r.depth,
      self_closing: r.self_closing,
    });

  let patched = match last_paragraph {
    Some(p) if p.self_closing => expand_self_closing(xml, p, &run),
    Some(p) => splice(xml, p.inner.1, p.inner.1, run.as_bytes()),
    None => splice(xml, tc.inner.1, tc.inner.1, template.as_bytes()),
  };
  Ok(patched)
}
