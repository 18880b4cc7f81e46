//! Cell text update (spec §4.5): locates a cell by table id + row/col,
//! then falls back through five patterns depending on what is already
//! there, finally resetting any stale line-segment geometry since the
//! text length has changed underneath it.

use crate::error::{HwpxError, HwpxResult};
use crate::locator::{self, ElementRange};
use crate::mutators::{escape_xml_text, expand_self_closing, expand_self_closing_with_attr, splice};

/// Which of the five fallback patterns actually fired, surfaced for tests
/// and logging rather than silently folding them all into one code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellUpdatePattern {
  /// An existing run already carries the requested `charPrIDRef`.
  MatchingRunCharPr,
  /// An existing run's text is replaced; `charPrIDRef` upserted if given.
  ExistingRun,
  /// A self-closing or empty `<t/>` is expanded to hold the new text.
  ExpandedTextElement,
  /// A self-closing `<run/>` is expanded to hold a new `<t>` text node.
  ExpandedRun,
  /// An existing run has no `<t>` child at all; one is injected.
  InjectedTextNode,
  /// The paragraph has no run; one is synthesized.
  SynthesizedRun,
  /// The cell has no paragraph; one is synthesized with a run inside.
  SynthesizedParagraph,
}

fn first_within(xml: &[u8], outer: (usize, usize), tag: &str) -> Option<ElementRange> {
  locator::find_nth_within(xml, outer, tag, 0)
}

/// Applies a cell text update to `xml`, returning the fully patched part.
pub fn apply_cell_update(
  xml: &[u8],
  table_id: u32,
  row: u32,
  col: u32,
  new_text: &str,
  char_pr_id_ref: Option<u32>,
) -> HwpxResult<(Vec<u8>, CellUpdatePattern)> {
  let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
  let tr = locator::find_nth_within(xml, table.outer, "tr", row as usize)
    .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} has no row {}", table_id, row)))?;
  let tc = locator::find_nth_within(xml, tr.outer, "tc", col as usize)
    .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} row {} has no column {}", table_id, row, col)))?;

  let escaped = escape_xml_text(new_text);

  let (patched, pattern) = match first_within(xml, tc.inner, "p") {
    None => {
      // Pattern 4/5 collapsed: no paragraph at all, synthesize one.
      let paragraph = format!(
        "<hp:p><hp:run{}><hp:t>{}</hp:t></hp:run></hp:p>",
        char_pr_id_ref.map(|id| format!(" charPrIDRef=\"{}\"", id)).unwrap_or_default(),
        escaped
      );
      (splice(xml, tc.inner.0, tc.inner.0, paragraph.as_bytes()), CellUpdatePattern::SynthesizedParagraph)
    }
    Some(paragraph) => match first_within(xml, paragraph.inner, "run") {
      None => {
        let run = format!(
          "<hp:run{}><hp:t>{}</hp:t></hp:run>",
          char_pr_id_ref.map(|id| format!(" charPrIDRef=\"{}\"", id)).unwrap_or_default(),
          escaped
        );
        (splice(xml, paragraph.inner.0, paragraph.inner.0, run.as_bytes()), CellUpdatePattern::SynthesizedRun)
      }
      Some(run) => {
        let run_has_matching_char_pr = char_pr_id_ref
          .map(|wanted| locator::attr_value(xml, run, "charPrIDRef").as_deref() == Some(&wanted.to_string()))
          .unwrap_or(false);

        if run.self_closing {
          // Pattern 3: self-closing run, expand to contain a new <t>.
          let inner = format!("<hp:t>{}</hp:t>", escaped);
          let out = match (run_has_matching_char_pr, char_pr_id_ref) {
            (false, Some(wanted)) => expand_self_closing_with_attr(xml, run, &inner, "charPrIDRef", &wanted.to_string()),
            _ => expand_self_closing(xml, run, &inner),
          };
          let pattern = if run_has_matching_char_pr {
            CellUpdatePattern::MatchingRunCharPr
          } else {
            CellUpdatePattern::ExpandedRun
          };
          (out, pattern)
        } else {
          match first_within(xml, run.inner, "t") {
            None => {
              // Pattern 4: run has no <t> child at all, inject one.
              let t_elem = format!("<hp:t>{}</hp:t>", escaped);
              let mut out = splice(xml, run.inner.0, run.inner.0, t_elem.as_bytes());
              if let (false, Some(wanted)) = (run_has_matching_char_pr, char_pr_id_ref) {
                out = upsert_char_pr_id_ref(&out, run, wanted);
              }
              let pattern = if run_has_matching_char_pr {
                CellUpdatePattern::MatchingRunCharPr
              } else {
                CellUpdatePattern::InjectedTextNode
              };
              (out, pattern)
            }
            Some(text_elem) if text_elem.self_closing => {
              // Pattern 2: self-closing/empty <t/>, expand to hold the text.
              let mut out = expand_self_closing(xml, text_elem, &escaped);
              if let (false, Some(wanted)) = (run_has_matching_char_pr, char_pr_id_ref) {
                out = upsert_char_pr_id_ref(&out, run, wanted);
              }
              let pattern = if run_has_matching_char_pr {
                CellUpdatePattern::MatchingRunCharPr
              } else {
                CellUpdatePattern::ExpandedTextElement
              };
              (out, pattern)
            }
            Some(text_elem) => {
              // Pattern 1: an ordinary <t>...</t> body is replaced in place.
              let mut out = splice(xml, text_elem.inner.0, text_elem.inner.1, escaped.as_bytes());
              if let (false, Some(wanted)) = (run_has_matching_char_pr, char_pr_id_ref) {
                out = upsert_char_pr_id_ref(&out, run, wanted);
              }
              let pattern = if run_has_matching_char_pr {
                CellUpdatePattern::MatchingRunCharPr
              } else {
                CellUpdatePattern::ExistingRun
              };
              (out, pattern)
            }
          }
        }
      }
    },
  };

  let reset = reset_line_segments(&patched, table_id, row, col);
  Ok((reset, pattern))
}

fn upsert_char_pr_id_ref(xml: &[u8], run: ElementRange, value: u32) -> Vec<u8> {
  let tag_bytes = &xml[run.outer.0..run.inner.0];
  match locator::find_attr_value_range(tag_bytes, "charPrIDRef") {
    Some((s, e)) => splice(xml, run.outer.0 + s, run.outer.0 + e, value.to_string().as_bytes()),
    None => {
      // No existing attribute: insert one right after the tag name.
      let insert_at = run.outer.0 + memchr::memchr(b' ', tag_bytes).unwrap_or(tag_bytes.len().saturating_sub(1));
      let attr = format!(" charPrIDRef=\"{}\"", value);
      splice(xml, insert_at, insert_at, attr.as_bytes())
    }
  }
}

/// Strips stale `linesegarray` geometry from the cell's paragraph, since a
/// text-length change invalidates any cached line-break layout; an external
/// layout pass is expected to repopulate it before rendering.
fn reset_line_segments(xml: &[u8], table_id: u32, row: u32, col: u32) -> Vec<u8> {
  let table = match locator::find_by_id(xml, "tbl", "id", &table_id.to_string()) {
    Some(t) => t,
    None => return xml.to_vec(),
  };
  let tr = match locator::find_nth_within(xml, table.outer, "tr", row as usize) {
    Some(t) => t,
    None => return xml.to_vec(),
  };
  let tc = match locator::find_nth_within(xml, tr.outer, "tc", col as usize) {
    Some(t) => t,
    None => return xml.to_vec(),
  };
  match first_within(xml, tc.inner, "linesegarray") {
    Some(range) if !range.self_closing => splice(xml, range.inner.0, range.inner.1, b""),
    _ => xml.to_vec(),
  }
}
