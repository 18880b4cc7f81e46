//! Save pipeline (spec §4.6): fail fast on a read-only legacy-binary
//! container, drain the mutation log in apply order and replay it against
//! each section's pristine baseline, validate every touched part,
//! synchronize header metadata against the document's title/creator/
//! subject/description fields, and emit the archive bytes. The actual
//! tmp-file-then-rename write to disk is `atomic_write`'s job, kept
//! separate from the in-memory pipeline this module owns.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::document::Document;
use crate::error::{HwpxError, HwpxResult};
use crate::model::ContainerFormat;
use crate::mutation_log::MutationEntry;
use crate::mutators::{cell, escape_xml_text, image, nested_table, text};
use crate::validator;
use crate::zip_container::Container;

/// Part-name convention this crate assumes for section XML members.
pub fn section_part_name(index: usize) -> String {
  format!("Contents/section{}.xml", index)
}

/// Part name of the header, carrying the document-level metadata elements
/// `save_to_bytes` synchronizes by literal substitution.
pub const HEADER_PART_NAME: &str = "Contents/header.xml";

/// Applies one drained `MutationEntry` to the bytes of its own section,
/// dispatching to the mutator that originally produced the logged edit.
fn apply_entry(xml: &[u8], entry: &MutationEntry) -> HwpxResult<Vec<u8>> {
  match entry {
    MutationEntry::CellUpdate { table_id, row, col, new_text, char_pr_id_ref, .. } => {
      cell::apply_cell_update(xml, *table_id, *row, *col, new_text, *char_pr_id_ref).map(|(bytes, _)| bytes)
    }
    MutationEntry::NestedTableInsert { parent_table_id, row, col, rows, cols, new_table_id, .. } => {
      nested_table::apply_nested_table_insert_with_id(xml, *parent_table_id, *row, *col, *rows, *cols, *new_table_id)
    }
    MutationEntry::DirectTextUpdate { paragraph_id, run_index, new_text, .. } => {
      text::apply_direct_text_update(xml, *paragraph_id, *run_index, new_text)
    }
    MutationEntry::TextReplacement {
      pattern,
      replacement,
      is_regex,
      case_sensitive,
      cell_scope,
      include_tables,
      exclude_tables,
      ..
    } => text::apply_text_replacement(
      xml,
      pattern,
      replacement,
      *is_regex,
      *case_sensitive,
      *cell_scope,
      include_tables.as_deref(),
      exclude_tables,
    ),
    MutationEntry::ImageInsert { bin_item_id, width_hwpunit, height_hwpunit, insert_after_paragraph_id, pic_id, .. } => {
      image::apply_image_insert(xml, *pic_id, bin_item_id, *width_hwpunit, *height_hwpunit, *insert_after_paragraph_id)
    }
  }
}

fn entry_section(entry: &MutationEntry) -> usize {
  match entry {
    MutationEntry::CellUpdate { section, .. }
    | MutationEntry::NestedTableInsert { section, .. }
    | MutationEntry::DirectTextUpdate { section, .. }
    | MutationEntry::TextReplacement { section, .. }
    | MutationEntry::ImageInsert { section, .. } => *section,
  }
}

/// Rewrites the text content of `tag_local`'s first occurrence in `xml` to
/// `value`, by literal substitution — the element is assumed to already
/// exist in the header template; a missing element is left untouched
/// rather than synthesized.
fn substitute_element_text(xml: &[u8], tag_local: &str, value: &str) -> Vec<u8> {
  match crate::locator::find_by_index(xml, tag_local, 0) {
    Some(range) if !range.self_closing => {
      crate::mutators::splice(xml, range.inner.0, range.inner.1, escape_xml_text(value).as_bytes())
    }
    _ => xml.to_vec(),
  }
}

/// Synchronizes `title`/`creator`/`subject`/`description` into the header
/// part's matching elements (spec §4.6 step 3); fields left `None` leave
/// the header's existing element untouched.
fn sync_header_metadata(
  xml: &[u8],
  title: Option<&str>,
  creator: Option<&str>,
  subject: Option<&str>,
  description: Option<&str>,
) -> Vec<u8> {
  let mut out = xml.to_vec();
  if let Some(v) = title {
    out = substitute_element_text(&out, "title", v);
  }
  if let Some(v) = creator {
    out = substitute_element_text(&out, "author", v);
  }
  if let Some(v) = subject {
    out = substitute_element_text(&out, "subject", v);
  }
  if let Some(v) = description {
    out = substitute_element_text(&out, "description", v);
  }
  out
}

/// Runs the save pipeline: fails fast on a read-only legacy-binary
/// container, otherwise drains the document's mutation log and replays it
/// against each section's pristine baseline (`Section::original_xml`),
/// rather than trusting the already-mutated `raw_xml` directly — the log
/// is what actually produces the saved bytes. On success, every section's
/// `raw_xml`/`original_xml` are reset to the replayed bytes, and the
/// mutation log is left drained.
pub fn save_to_bytes(document: &mut Document, original_container: &Container) -> HwpxResult<Vec<u8>> {
  if document.model.format == ContainerFormat::LegacyBinary {
    return Err(HwpxError::FormatReadOnly("legacy binary container".into()));
  }

  let mut overrides: HashMap<String, Vec<u8>> = HashMap::new();

  // Replay against a peeked, ordered copy of the log first: a failure
  // partway through (a bad entry, a validation error below) must leave
  // the document's actual log untouched so the caller can fix the input
  // and retry the save rather than losing the pending edits outright.
  let mut working: Vec<Vec<u8>> = document.model.sections.iter().map(|s| s.original_xml.clone()).collect();
  for entry in document.mutation_log_in_apply_order() {
    let section = entry_section(&entry);
    let xml = working
      .get(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    working[section] = apply_entry(xml, &entry)?;
  }

  for (index, xml) in working.iter().enumerate() {
    validator::check_structure(xml).map_err(HwpxError::InvalidXmlInput)?;
    validator::require_balanced(xml, "tbl")?;
    validator::require_balanced(xml, "tr")?;
    validator::require_balanced(xml, "tc")?;
    validator::require_balanced(xml, "p")?;
    if let Some(pos) = validator::find_bare_left_angle_in_text(xml) {
      return Err(HwpxError::InvalidXmlInput(format!("unescaped '<' in text content at byte {}", pos)));
    }
    overrides.insert(section_part_name(index), xml.clone());
  }

  for item in document.model.binary_items.values() {
    let path = format!("BinData/{}", item.id);
    let bytes = BASE64
      .decode(&item.data_base64)
      .map_err(|e| HwpxError::InvalidXmlInput(e.to_string()))?;
    overrides.insert(path, bytes);
  }

  if let Some(header) = original_container.get(HEADER_PART_NAME) {
    let synced = sync_header_metadata(
      header,
      document.model.title.as_deref(),
      document.model.creator.as_deref(),
      document.model.subject.as_deref(),
      document.model.description.as_deref(),
    );
    overrides.insert(HEADER_PART_NAME.to_string(), synced);
  }

  let emitted = original_container.save_with_overrides(&overrides)?;

  // Verification pass: reopen what we just produced and confirm every
  // overridden member is present and byte-identical to what we intended to
  // write, so a writer bug surfaces before anything touches disk.
  let reopened = Container::open(&emitted)?;
  for (name, expected) in &overrides {
    match reopened.get(name) {
      Some(actual) if actual == expected.as_slice() => {}
      Some(_) => {
        return Err(crate::error::HwpxError::SaveVerificationFailed(format!(
          "member {} did not round-trip byte-for-byte",
          name
        )))
      }
      None => {
        return Err(crate::error::HwpxError::SaveVerificationFailed(format!(
          "member {} missing after save",
          name
        )))
      }
    }
  }

  document.take_mutation_log();
  for (index, xml) in working.into_iter().enumerate() {
    if let Some(section) = document.model.sections.get_mut(index) {
      section.raw_xml = xml.clone();
      section.original_xml = xml;
    }
  }

  Ok(emitted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model;
  use std::io::Write;
  use zip::write::FileOptions;
  use zip::{CompressionMethod, ZipWriter};

  fn sample_container() -> Container {
    let mut buf = Vec::new();
    {
      let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buf));
      let options = FileOptions::default().compression_method(CompressionMethod::Stored);
      writer.start_file("mimetype", options).unwrap();
      writer.write_all(b"application/hwp+zip").unwrap();
      writer.start_file(section_part_name(0), options).unwrap();
      writer.write_all(b"<hp:sec/>").unwrap();
      writer.finish().unwrap();
    }
    Container::open(&buf).unwrap()
  }

  #[test]
  fn save_overrides_section_and_verifies_round_trip() {
    let container = sample_container();
    let mut doc_model = model::Document::new();
    doc_model.sections.push(model::Section {
      index: 0,
      raw_xml: b"<hp:sec><hp:p id=\"1\"/></hp:sec>".to_vec(),
      original_xml: b"<hp:sec><hp:p id=\"1\"/></hp:sec>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    let mut document = Document::from_model(doc_model);
    let bytes = save_to_bytes(&mut document, &container).unwrap();
    let reopened = Container::open(&bytes).unwrap();
    assert_eq!(reopened.get(&section_part_name(0)), Some(&b"<hp:sec><hp:p id=\"1\"/></hp:sec>"[..]));
    assert_eq!(reopened.get("mimetype"), Some(&b"application/hwp+zip"[..]));
  }

  #[test]
  fn rejects_unbalanced_tables() {
    let container = sample_container();
    let mut doc_model = model::Document::new();
    doc_model.sections.push(model::Section {
      index: 0,
      raw_xml: b"<hp:sec><hp:tbl></hp:sec>".to_vec(),
      original_xml: b"<hp:sec><hp:tbl></hp:sec>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    let mut document = Document::from_model(doc_model);
    assert!(save_to_bytes(&mut document, &container).is_err());
  }

  #[test]
  fn legacy_binary_format_is_rejected_before_any_other_work() {
    let container = sample_container();
    let mut doc_model = model::Document::new();
    doc_model.format = model::ContainerFormat::LegacyBinary;
    let mut document = Document::from_model(doc_model);
    let result = save_to_bytes(&mut document, &container);
    assert!(matches!(result, Err(crate::error::HwpxError::FormatReadOnly(_))));
  }

  #[test]
  fn header_metadata_is_synced_by_literal_substitution() {
    let mut buf = Vec::new();
    {
      let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buf));
      let options = FileOptions::default().compression_method(CompressionMethod::Stored);
      writer.start_file("mimetype", options).unwrap();
      writer.write_all(b"application/hwp+zip").unwrap();
      writer.start_file(section_part_name(0), options).unwrap();
      writer.write_all(b"<hp:sec/>").unwrap();
      writer.start_file(HEADER_PART_NAME, options).unwrap();
      writer.write_all(b"<hh:head><hh:title>Old</hh:title><hh:author>Old Author</hh:author></hh:head>").unwrap();
      writer.finish().unwrap();
    }
    let container = Container::open(&buf).unwrap();
    let mut doc_model = model::Document::new();
    doc_model.sections.push(model::Section {
      index: 0,
      raw_xml: b"<hp:sec/>".to_vec(),
      original_xml: b"<hp:sec/>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    doc_model.title = Some("New Title".to_string());
    doc_model.creator = Some("New Author".to_string());
    let mut document = Document::from_model(doc_model);
    let bytes = save_to_bytes(&mut document, &container).unwrap();
    let reopened = Container::open(&bytes).unwrap();
    let header = std::str::from_utf8(reopened.get(HEADER_PART_NAME).unwrap()).unwrap();
    assert!(header.contains("<hh:title>New Title</hh:title>"));
    assert!(header.contains("<hh:author>New Author</hh:author>"));
  }

  /// The save pipeline must replay the log against `original_xml`, not
  /// merely copy out `raw_xml` as it stood after the facade's own
  /// immediate in-memory splice: a section whose `raw_xml` was hand-set to
  /// something the log never produced must not leak into the saved bytes.
  #[test]
  fn save_replays_the_log_against_the_original_baseline_not_raw_xml() {
    let container = sample_container();
    let mut document = Document::from_model({
      let mut doc_model = model::Document::new();
      doc_model.sections.push(model::Section {
        index: 0,
        raw_xml: b"<hp:sec><hp:tbl id=\"1\"><hp:tr><hp:tc><hp:p><hp:run><hp:t>tampered</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl></hp:sec>".to_vec(),
        original_xml: b"<hp:sec><hp:tbl id=\"1\"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl></hp:sec>".to_vec(),
        column_definition: None,
        page_settings: None,
        header_text: None,
        footer_text: None,
        elements: Vec::new(),
      });
      doc_model
    });
    document.update_cell(0, 1, 0, 0, "new", None).unwrap();

    let bytes = save_to_bytes(&mut document, &container).unwrap();
    let reopened = Container::open(&bytes).unwrap();
    let section = reopened.get(&section_part_name(0)).unwrap();
    let text = String::from_utf8_lossy(section);
    assert!(text.contains("<hp:t>new</hp:t>"));
    assert!(!text.contains("tampered"));
  }

  #[test]
  fn a_failed_save_leaves_the_pending_log_intact() {
    let container = sample_container();
    let mut doc_model = model::Document::new();
    doc_model.sections.push(model::Section {
      index: 0,
      raw_xml: b"<hp:sec><hp:tbl id=\"1\"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl></hp:sec>".to_vec(),
      original_xml: b"<hp:sec><hp:tbl id=\"1\"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl></hp:sec>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    let mut document = Document::from_model(doc_model);
    document.update_cell(0, 1, 0, 0, "new", None).unwrap();
    document.model.format = model::ContainerFormat::LegacyBinary;

    assert!(save_to_bytes(&mut document, &container).is_err());
    assert_eq!(document.mutation_log_len(), 1);
  }
}
