//! Styled overlays (spec §4.4): bookmarks, hyperlinks, footnotes/endnotes
//! and memos. HWPX represents all four as a field wrapper around the run
//! they annotate, so each of these injects a field element as a sibling of
//! (bookmark) or wrapper around (hyperlink/footnote/endnote/memo) the
//! target run, rather than introducing a new element kind for each.

use crate::error::{HwpxError, HwpxResult};
use crate::locator;
use crate::mutators::{escape_xml_text, splice};

/// Inserts a `<hp:bookmark name="..."/>` marker immediately before the
/// `run_index`-th run of paragraph `paragraph_id`.
pub fn apply_bookmark_insert(xml: &[u8], paragraph_id: u32, run_index: usize, name: &str) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  let fragment = format!(r#"<hp:bookmark name="{}"/>"#, escape_xml_text(name));
  Ok(splice(xml, run.outer.0, run.outer.0, fragment.as_bytes()))
}

/// Wraps the `run_index`-th run's text in a hyperlink field pointing at
/// `url`, leaving the run's own attributes and other runs untouched.
pub fn apply_hyperlink_insert(xml: &[u8], paragraph_id: u32, run_index: usize, url: &str) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  let begin = format!(r#"<hp:fieldBegin type="HYPERLINK" command="{}"/>"#, escape_xml_text(url));
  let mut out = splice(xml, run.outer.1, run.outer.1, b"<hp:fieldEnd/>");
  out = splice(&out, run.outer.0, run.outer.0, begin.as_bytes());
  Ok(out)
}

/// Which of the two note kinds a note-insert targets; both use the same
/// XML shape with a different tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
  Footnote,
  Endnote,
}

impl NoteKind {
  fn tag(self) -> &'static str {
    match self {
      NoteKind::Footnote => "footnote",
      NoteKind::Endnote => "endnote",
    }
  }
}

/// Appends a footnote/endnote back-reference after the `run_index`-th run,
/// carrying `note_text` as the note body's own paragraph content.
pub fn apply_note_insert(
  xml: &[u8],
  paragraph_id: u32,
  run_index: usize,
  kind: NoteKind,
  note_id: u32,
  note_text: &str,
) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  let tag = kind.tag();
  let fragment = format!(
    r#"<hp:{tag} id="{id}"><hp:subList><hp:p><hp:run><hp:t>{text}</hp:t></hp:run></hp:p></hp:subList></hp:{tag}>"#,
    tag = tag,
    id = note_id,
    text = escape_xml_text(note_text)
  );
  Ok(splice(xml, run.outer.1, run.outer.1, fragment.as_bytes()))
}

/// Inserts a memo back-reference field after the `run_index`-th run and a
/// matching memo entry in the section's memo list, tagged with `memo_id`.
pub fn apply_memo_insert(xml: &[u8], paragraph_id: u32, run_index: usize, memo_id: u32, text: &str) -> HwpxResult<Vec<u8>> {
  let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
    .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
  let run = locator::find_nth_within(xml, paragraph.inner, "run", run_index).ok_or_else(|| {
    HwpxError::StructuralAnomaly(format!("paragraph {} has no run {}", paragraph_id, run_index))
  })?;
  let fragment = format!(
    r#"<hp:memo id="{}"><hp:subList><hp:p><hp:run><hp:t>{}</hp:t></hp:run></hp:p></hp:subList></hp:memo>"#,
    memo_id,
    escape_xml_text(text)
  );
  Ok(splice(xml, run.outer.1, run.outer.1, fragment.as_bytes()))
}
