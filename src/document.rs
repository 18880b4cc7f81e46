//! The document facade (spec §4.4): the verb catalog client code actually
//! calls. Every mutating verb funnels through `mutate_logged`, which
//! snapshots for undo, applies the byte-level change to the target
//! section's raw XML, appends the corresponding mutation-log entry and
//! marks the document dirty, so no individual verb can forget a step.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{HwpxError, HwpxResult};
use crate::id_gen::IdGenerator;
use crate::locator::{self, ElementRange};
use crate::model::{self, BinaryItem};
use crate::mutation_log::{MutationEntry, MutationLog};
use crate::mutators::{cell, fields, image, nested_table, shapes, structure, style_apply, text};
use crate::typography;
use crate::undo::UndoStack;
use crate::validator;

pub struct Document {
  pub model: model::Document,
  log: MutationLog,
  undo: UndoStack,
  id_gen: IdGenerator,
  dirty: bool,
  /// Mutation-log length recorded before each undo-stack snapshot, so
  /// `undo` can truncate the log back to the same point as the restored
  /// model — otherwise a logged edit would survive an undo and still be
  /// replayed at save time despite the model no longer reflecting it.
  log_undo_marks: Vec<usize>,
  /// Entries an `undo` truncated off the log, stashed so a following
  /// `redo` can splice them back on rather than losing them outright.
  log_redo_tails: Vec<Vec<MutationEntry>>,
}

impl Document {
  pub fn new() -> Self {
    Document {
      model: model::Document::new(),
      log: MutationLog::new(),
      undo: UndoStack::new(),
      id_gen: IdGenerator::new(),
      dirty: false,
      log_undo_marks: Vec::new(),
      log_redo_tails: Vec::new(),
    }
  }

  /// Wraps an already-populated model (as an external semantic parser
  /// would hand back after a first load), seeding the ID generator so
  /// freshly minted IDs never collide with anything already present.
  pub fn from_model(model: model::Document) -> Self {
    let mut id_gen = IdGenerator::new();
    id_gen.seed(collect_table_ids(&model));
    for section in &model.sections {
      let ids = locator::find_all(&section.raw_xml, "tbl")
        .into_iter()
        .filter_map(|r| locator::attr_value(&section.raw_xml, r, "id"))
        .filter_map(|s| s.parse().ok());
      id_gen.seed(ids);
    }
    Document {
      model,
      log: MutationLog::new(),
      undo: UndoStack::new(),
      id_gen,
      dirty: false,
      log_undo_marks: Vec::new(),
      log_redo_tails: Vec::new(),
    }
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  pub fn mutation_log_len(&self) -> usize {
    self.log.len()
  }

  /// Drains the mutation log for the save pipeline. Every undo mark still
  /// pointing into the now-emptied log is dropped along with it: once a
  /// save has folded those entries into `original_xml`, there is nothing
  /// left for a later `undo` to roll the log back to.
  pub fn take_mutation_log(&mut self) -> MutationLog {
    self.log_undo_marks.clear();
    self.log_redo_tails.clear();
    std::mem::take(&mut self.log)
  }

  /// A cloned, apply-ordered view of the pending log, for a caller (the
  /// save pipeline) that wants to trial-replay it before committing to
  /// actually draining it via `take_mutation_log`.
  pub fn mutation_log_in_apply_order(&self) -> Vec<MutationEntry> {
    self.log.clone_in_apply_order()
  }

  fn section_xml_mut(&mut self, section: usize) -> HwpxResult<&mut Vec<u8>> {
    self
      .model
      .sections
      .get_mut(section)
      .map(|s| &mut s.raw_xml)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))
  }

  fn section_xml(&self, section: usize) -> HwpxResult<&[u8]> {
    self
      .model
      .sections
      .get(section)
      .map(|s| s.raw_xml.as_slice())
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))
  }

  /// Snapshots the model for undo and records the mutation log's current
  /// length as the point to roll back to, clearing any stashed redo tail —
  /// every mutating verb (logged, unlogged, or purely structural) must
  /// call this exactly once before it touches `self.model`, so the two
  /// undo-adjacent stacks (`self.undo` and `self.log_undo_marks`) never
  /// drift out of lockstep with each other.
  fn record_undo_point(&mut self) -> HwpxResult<()> {
    self.undo.record(&self.model)?;
    self.log_undo_marks.push(self.log.len());
    self.log_redo_tails.clear();
    Ok(())
  }

  /// Runs the common snapshot/apply/log/dirty sequence every mutating verb
  /// shares. `apply` receives the section's current raw XML and returns the
  /// patched bytes.
  fn mutate_logged(
    &mut self,
    section: usize,
    entry: MutationEntry,
    apply: impl FnOnce(&[u8]) -> HwpxResult<Vec<u8>>,
  ) -> HwpxResult<()> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let patched = apply(current)?;
    validator::require_balanced(&patched, "tbl")?;
    *self.section_xml_mut(section)? = patched;
    self.log.push(entry);
    self.dirty = true;
    Ok(())
  }

  /// Like `mutate_logged` but for verbs outside the five mutation-log
  /// variants of spec §4.3 (row/column structure, style overlays, shapes):
  /// snapshot, apply, validate, mark dirty — without a log entry. Since
  /// these edits have no log entry to replay at save time, they must land
  /// in both `raw_xml` (current state) and `original_xml` (the baseline
  /// the save pipeline replays logged entries against) — `apply` is
  /// applied independently to each rather than copying one's patched bytes
  /// into the other, so a pending logged edit already folded into
  /// `raw_xml` is never accidentally baked into the baseline.
  fn mutate_unlogged(&mut self, section: usize, apply: impl Fn(&[u8]) -> HwpxResult<Vec<u8>>) -> HwpxResult<()> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let patched = apply(current)?;
    validator::require_balanced(&patched, "tbl")?;
    let baseline = self
      .model
      .sections
      .get(section)
      .map(|s| s.original_xml.as_slice())
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    let patched_baseline = apply(baseline)?;
    let s = self
      .model
      .sections
      .get_mut(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    s.raw_xml = patched;
    s.original_xml = patched_baseline;
    self.dirty = true;
    Ok(())
  }

  // ---- Table verbs -----------------------------------------------------

  pub fn list_tables(&self, section: usize) -> HwpxResult<Vec<u32>> {
    let xml = self.section_xml(section)?;
    Ok(
      locator::find_all(xml, "tbl")
        .into_iter()
        .filter_map(|r| locator::attr_value(xml, r, "id"))
        .filter_map(|s| s.parse().ok())
        .collect(),
    )
  }

  pub fn get_table_range(&self, section: usize, table_id: u32) -> HwpxResult<ElementRange> {
    let xml = self.section_xml(section)?;
    locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))
  }

  pub fn get_cell_text(&self, section: usize, table_id: u32, row: u32, col: u32) -> HwpxResult<String> {
    let xml = self.section_xml(section)?;
    let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
    let tr = locator::find_nth_within(xml, table.outer, "tr", row as usize)
      .ok_or_else(|| HwpxError::StructuralAnomaly(format!("table {} has no row {}", table_id, row)))?;
    let tc = locator::find_nth_within(xml, tr.outer, "tc", col as usize).ok_or_else(|| {
      HwpxError::StructuralAnomaly(format!("table {} row {} has no column {}", table_id, row, col))
    })?;
    let t = locator::find_nth_within(xml, tc.inner, "t", 0);
    Ok(t.map(|r| String::from_utf8_lossy(&xml[r.inner.0..r.inner.1]).into_owned()).unwrap_or_default())
  }

  pub fn update_cell(
    &mut self,
    section: usize,
    table_id: u32,
    row: u32,
    col: u32,
    new_text: &str,
    char_pr_id_ref: Option<u32>,
  ) -> HwpxResult<()> {
    let entry = MutationEntry::CellUpdate {
      section,
      table_id,
      row,
      col,
      new_text: new_text.to_string(),
      char_pr_id_ref,
    };
    self.mutate_logged(section, entry, |xml| {
      cell::apply_cell_update(xml, table_id, row, col, new_text, char_pr_id_ref).map(|(bytes, _)| bytes)
    })
  }

  pub fn insert_nested_table(
    &mut self,
    section: usize,
    parent_table_id: u32,
    row: u32,
    col: u32,
    rows: u32,
    cols: u32,
  ) -> HwpxResult<u32> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?.to_vec();
    let (patched, new_id) =
      nested_table::apply_nested_table_insert(&current, parent_table_id, row, col, rows, cols, &mut self.id_gen)?;
    validator::require_balanced(&patched, "tbl")?;
    *self.section_xml_mut(section)? = patched;
    self.log.push(MutationEntry::NestedTableInsert {
      section,
      parent_table_id,
      row,
      col,
      rows,
      cols,
      new_table_id: new_id,
    });
    self.dirty = true;
    Ok(new_id)
  }

  pub fn insert_table(&mut self, section: usize, insert_at: usize, rows: u32, cols: u32) -> HwpxResult<u32> {
    self.record_undo_point()?;
    let new_id = self.id_gen.next_id();
    let template = nested_table::synthesize_table_template(new_id, rows, cols);
    let current = self.section_xml(section)?;
    let insert_byte = insert_at.min(current.len());
    let patched = crate::mutators::splice(current, insert_byte, insert_byte, template.as_bytes());
    validator::require_balanced(&patched, "tbl")?;
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(new_id)
  }

  pub fn insert_row(&mut self, section: usize, table_id: u32, at_row: u32, col_count: u32, width_hwpunit: i64) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| structure::apply_insert_row(xml, table_id, at_row, col_count, width_hwpunit))
  }

  pub fn delete_row(&mut self, section: usize, table_id: u32, row: u32) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| structure::apply_delete_row(xml, table_id, row))
  }

  pub fn insert_column(&mut self, section: usize, table_id: u32, at_col: u32, width_hwpunit: i64) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| structure::apply_insert_column(xml, table_id, at_col, width_hwpunit))
  }

  pub fn delete_column(&mut self, section: usize, table_id: u32, col: u32) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| structure::apply_delete_column(xml, table_id, col))
  }

  pub fn set_cell_properties(&mut self, section: usize, table_id: u32, row: u32, col: u32, width_hwpunit: i64) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| structure::apply_set_cell_width(xml, table_id, row, col, width_hwpunit))
  }

  pub fn csv_export(&self, section: usize, table_id: u32) -> HwpxResult<String> {
    let xml = self.section_xml(section)?;
    let table = locator::find_by_id(xml, "tbl", "id", &table_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("table".into(), table_id.to_string()))?;
    let mut out = String::new();
    for tr in locator::find_all(&xml[table.outer.0..table.outer.1], "tr") {
      let tr_outer = (tr.outer.0 + table.outer.0, tr.outer.1 + table.outer.0);
      let mut row_cells = Vec::new();
      for tc in locator::find_all(&xml[tr_outer.0..tr_outer.1], "tc") {
        let tc_inner = (tc.inner.0 + tr_outer.0, tc.inner.1 + tr_outer.0);
        let text = locator::find_nth_within(xml, tc_inner, "t", 0)
          .map(|r| String::from_utf8_lossy(&xml[r.inner.0..r.inner.1]).into_owned())
          .unwrap_or_default();
        row_cells.push(text.replace(',', " "));
      }
      out.push_str(&row_cells.join(","));
      out.push('\n');
    }
    Ok(out)
  }

  pub fn hanging_indent_width(&self, marker: &str, font_size_pt: f64) -> i64 {
    typography::hanging_indent_width(marker, font_size_pt)
  }

  // ---- Paragraph verbs ---------------------------------------------------

  pub fn update_run_text(
    &mut self,
    section: usize,
    paragraph_id: u32,
    run_index: usize,
    new_text: &str,
  ) -> HwpxResult<()> {
    let entry = MutationEntry::DirectTextUpdate {
      section,
      paragraph_id,
      run_index,
      new_text: new_text.to_string(),
    };
    self.mutate_logged(section, entry, |xml| {
      text::apply_direct_text_update(xml, paragraph_id, run_index, new_text)
    })
  }

  pub fn delete_paragraph(&mut self, section: usize, paragraph_id: u32) -> HwpxResult<()> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let range = locator::find_by_id(current, "p", "id", &paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
    let patched = crate::mutators::splice(current, range.outer.0, range.outer.1, b"");
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(())
  }

  pub fn insert_paragraph_after(&mut self, section: usize, after_paragraph_id: u32, text_content: &str) -> HwpxResult<u32> {
    self.record_undo_point()?;
    let new_id = self.id_gen.next_id();
    let current = self.section_xml(section)?;
    let range = locator::find_by_id(current, "p", "id", &after_paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), after_paragraph_id.to_string()))?;
    let fragment = format!(
      r#"<hp:p id="{}"><hp:run><hp:t>{}</hp:t></hp:run></hp:p>"#,
      new_id,
      crate::mutators::escape_xml_text(text_content)
    );
    let patched = crate::mutators::splice(current, range.outer.1, range.outer.1, fragment.as_bytes());
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(new_id)
  }

  /// Appends `text_content` as a brand-new trailing run of paragraph
  /// `paragraph_id`, leaving any existing runs untouched.
  pub fn append_text(&mut self, section: usize, paragraph_id: u32, text_content: &str) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| {
      let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
        .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
      let fragment = format!(
        "<hp:run><hp:t>{}</hp:t></hp:run>",
        crate::mutators::escape_xml_text(text_content)
      );
      Ok(crate::mutators::splice(xml, paragraph.inner.1, paragraph.inner.1, fragment.as_bytes()))
    })
  }

  pub fn apply_character_style(&mut self, section: usize, paragraph_id: u32, run_index: usize, char_pr_id_ref: u32) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| style_apply::apply_character_style(xml, paragraph_id, run_index, char_pr_id_ref))
  }

  pub fn apply_paragraph_style(&mut self, section: usize, paragraph_id: u32, para_pr_id_ref: u32) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| style_apply::apply_paragraph_style(xml, paragraph_id, para_pr_id_ref))
  }

  pub fn apply_named_style(&mut self, section: usize, paragraph_id: u32, style_id_ref: u32) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| style_apply::apply_named_style(xml, paragraph_id, style_id_ref))
  }

  /// Copies paragraph `paragraph_id` and inserts the copy immediately
  /// after it, minting a fresh ID for the copy per spec §9's resolution of
  /// the `copyTable`-style open question (a copied subtree always gets a
  /// new identity, never the source's).
  pub fn copy_paragraph(&mut self, section: usize, paragraph_id: u32) -> HwpxResult<u32> {
    self.record_undo_point()?;
    let new_id = self.id_gen.next_id();
    let current = self.section_xml(section)?;
    let range = locator::find_by_id(current, "p", "id", &paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
    let source = &current[range.outer.0..range.outer.1];
    let copy = retag_paragraph_id(source, new_id);
    let patched = crate::mutators::splice(current, range.outer.1, range.outer.1, &copy);
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(new_id)
  }

  /// Moves paragraph `paragraph_id` to immediately after
  /// `after_paragraph_id`, preserving the paragraph's own ID and content.
  pub fn move_paragraph(&mut self, section: usize, paragraph_id: u32, after_paragraph_id: u32) -> HwpxResult<()> {
    if paragraph_id == after_paragraph_id {
      return Ok(());
    }
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let source = locator::find_by_id(current, "p", "id", &paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
    locator::find_by_id(current, "p", "id", &after_paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), after_paragraph_id.to_string()))?;
    let bytes = current[source.outer.0..source.outer.1].to_vec();
    let removed = crate::mutators::splice(current, source.outer.0, source.outer.1, b"");
    // re-locate the target after removal since its offset may have shifted
    // when the source paragraph sat earlier in document order.
    let target_after = locator::find_by_id(&removed, "p", "id", &after_paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), after_paragraph_id.to_string()))?;
    let patched = crate::mutators::splice(&removed, target_after.outer.1, target_after.outer.1, &bytes);
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(())
  }

  // ---- Search / replace --------------------------------------------------

  /// Replaces every match of `pattern` across the whole section.
  /// `is_regex` toggles regex-vs-literal matching; `case_sensitive`
  /// toggles case folding; `include_tables`/`exclude_tables` optionally
  /// restrict the replacement to (or away from) specific table IDs.
  #[allow(clippy::too_many_arguments)]
  pub fn replace_all(
    &mut self,
    section: usize,
    pattern: &str,
    replacement: &str,
    is_regex: bool,
    case_sensitive: bool,
    include_tables: Option<Vec<u32>>,
    exclude_tables: Vec<u32>,
  ) -> HwpxResult<()> {
    let entry = MutationEntry::TextReplacement {
      section,
      pattern: pattern.to_string(),
      replacement: replacement.to_string(),
      is_regex,
      case_sensitive,
      cell_scope: None,
      include_tables: include_tables.clone(),
      exclude_tables: exclude_tables.clone(),
    };
    self.mutate_logged(section, entry, |xml| {
      text::apply_text_replacement(
        xml,
        pattern,
        replacement,
        is_regex,
        case_sensitive,
        None,
        include_tables.as_deref(),
        &exclude_tables,
      )
    })
  }

  /// Replaces every match of `pattern` within a single cell, taking
  /// precedence over any table scoping `replace_all` would otherwise apply.
  #[allow(clippy::too_many_arguments)]
  pub fn replace_in_cell(
    &mut self,
    section: usize,
    table_id: u32,
    row: u32,
    col: u32,
    pattern: &str,
    replacement: &str,
    is_regex: bool,
    case_sensitive: bool,
  ) -> HwpxResult<()> {
    let entry = MutationEntry::TextReplacement {
      section,
      pattern: pattern.to_string(),
      replacement: replacement.to_string(),
      is_regex,
      case_sensitive,
      cell_scope: Some((table_id, row, col)),
      include_tables: None,
      exclude_tables: Vec::new(),
    };
    self.mutate_logged(section, entry, |xml| {
      text::apply_text_replacement(xml, pattern, replacement, is_regex, case_sensitive, Some((table_id, row, col)), None, &[])
    })
  }

  // ---- Graphics -----------------------------------------------------------

  pub fn insert_image(
    &mut self,
    section: usize,
    image_data: Vec<u8>,
    width_hwpunit: Option<i64>,
    height_hwpunit: Option<i64>,
    aspect_ratio_mode: image::AspectRatioMode,
    insert_after_paragraph_id: Option<u32>,
  ) -> HwpxResult<u32> {
    let format = image::sniff_format(&image_data)?;
    let natural = image::natural_dimensions(&image_data, format);
    let (w, h) = image::resolve_size(width_hwpunit, height_hwpunit, natural, aspect_ratio_mode)?;

    let pic_id = self.id_gen.next_id();
    let extension = match format {
      image::ImageFormat::Png => "png",
      image::ImageFormat::Jpeg => "jpg",
      image::ImageFormat::Gif => "gif",
    };
    let bin_item_id = format!("image{}.{}", pic_id, extension);
    self.model.binary_items.insert(
      bin_item_id.clone(),
      BinaryItem {
        id: bin_item_id.clone(),
        extension: extension.to_string(),
        data_base64: BASE64.encode(&image_data),
      },
    );

    let entry = MutationEntry::ImageInsert {
      section,
      bin_item_id: bin_item_id.clone(),
      width_hwpunit: w,
      height_hwpunit: h,
      insert_after_paragraph_id,
      pic_id,
    };
    self.mutate_logged(section, entry, |xml| {
      image::apply_image_insert(xml, pic_id, &bin_item_id, w, h, insert_after_paragraph_id)
    })?;
    Ok(pic_id)
  }

  pub fn delete_image(&mut self, section: usize, pic_id: u32) -> HwpxResult<()> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let range = locator::find_by_id(current, "pic", "id", &pic_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("image".into(), pic_id.to_string()))?;
    let patched = crate::mutators::splice(current, range.outer.0, range.outer.1, b"");
    *self.section_xml_mut(section)? = patched;
    self.dirty = true;
    Ok(())
  }

  /// Rewrites the `width`/`height` of the `<hp:sz>` child of picture
  /// `pic_id`, leaving its position and binary-item reference untouched.
  pub fn update_image_size(&mut self, section: usize, pic_id: u32, width_hwpunit: i64, height_hwpunit: i64) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| {
      let pic = locator::find_by_id(xml, "pic", "id", &pic_id.to_string())
        .ok_or_else(|| HwpxError::NotFound("image".into(), pic_id.to_string()))?;
      let sz = locator::find_nth_within(xml, pic.inner, "sz", 0)
        .ok_or_else(|| HwpxError::StructuralAnomaly(format!("picture {} has no <sz>", pic_id)))?;
      let tag_bytes = &xml[sz.outer.0..sz.outer.1];
      let mut out = xml.to_vec();
      if let Some((s, e)) = locator::find_attr_value_range(tag_bytes, "width") {
        out = crate::mutators::splice(&out, sz.outer.0 + s, sz.outer.0 + e, width_hwpunit.to_string().as_bytes());
      }
      let sz = locator::find_nth_within(&out, pic.inner, "sz", 0)
        .ok_or_else(|| HwpxError::StructuralAnomaly(format!("picture {} has no <sz>", pic_id)))?;
      let tag_bytes = &out[sz.outer.0..sz.outer.1];
      if let Some((s, e)) = locator::find_attr_value_range(tag_bytes, "height") {
        out = crate::mutators::splice(&out, sz.outer.0 + s, sz.outer.0 + e, height_hwpunit.to_string().as_bytes());
      }
      Ok(out)
    })
  }

  fn insert_shape(
    &mut self,
    section: usize,
    kind: shapes::ShapeKind,
    width_hwpunit: i64,
    height_hwpunit: i64,
    insert_after_paragraph_id: Option<u32>,
  ) -> HwpxResult<u32> {
    let shape_id = self.id_gen.next_id();
    self.mutate_unlogged(section, |xml| {
      shapes::apply_shape_insert(xml, kind, shape_id, width_hwpunit, height_hwpunit, insert_after_paragraph_id)
    })?;
    Ok(shape_id)
  }

  pub fn insert_line(&mut self, section: usize, width_hwpunit: i64, height_hwpunit: i64, insert_after_paragraph_id: Option<u32>) -> HwpxResult<u32> {
    self.insert_shape(section, shapes::ShapeKind::Line, width_hwpunit, height_hwpunit, insert_after_paragraph_id)
  }

  pub fn insert_rect(&mut self, section: usize, width_hwpunit: i64, height_hwpunit: i64, insert_after_paragraph_id: Option<u32>) -> HwpxResult<u32> {
    self.insert_shape(section, shapes::ShapeKind::Rectangle, width_hwpunit, height_hwpunit, insert_after_paragraph_id)
  }

  pub fn insert_ellipse(&mut self, section: usize, width_hwpunit: i64, height_hwpunit: i64, insert_after_paragraph_id: Option<u32>) -> HwpxResult<u32> {
    self.insert_shape(section, shapes::ShapeKind::Ellipse, width_hwpunit, height_hwpunit, insert_after_paragraph_id)
  }

  pub fn insert_equation(&mut self, section: usize, script: &str, insert_after_paragraph_id: Option<u32>) -> HwpxResult<u32> {
    let equation_id = self.id_gen.next_id();
    self.mutate_unlogged(section, |xml| {
      shapes::apply_equation_insert(xml, equation_id, script, insert_after_paragraph_id)
    })?;
    Ok(equation_id)
  }

  // ---- Styled overlays ----------------------------------------------------

  /// Sets the section's header text (spec §4.4 "header / footer
  /// (text only)"). The header/footer parts themselves are an external
  /// collaborator's concern; this only updates the in-memory model field
  /// metadata sync reads at save time.
  pub fn set_header_text(&mut self, section: usize, text_content: &str) -> HwpxResult<()> {
    self.record_undo_point()?;
    let s = self
      .model
      .sections
      .get_mut(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    s.header_text = Some(text_content.to_string());
    self.dirty = true;
    Ok(())
  }

  pub fn set_footer_text(&mut self, section: usize, text_content: &str) -> HwpxResult<()> {
    self.record_undo_point()?;
    let s = self
      .model
      .sections
      .get_mut(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    s.footer_text = Some(text_content.to_string());
    self.dirty = true;
    Ok(())
  }

  pub fn insert_bookmark(&mut self, section: usize, paragraph_id: u32, run_index: usize, name: &str) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| fields::apply_bookmark_insert(xml, paragraph_id, run_index, name))
  }

  pub fn insert_hyperlink(&mut self, section: usize, paragraph_id: u32, run_index: usize, url: &str) -> HwpxResult<()> {
    self.mutate_unlogged(section, |xml| fields::apply_hyperlink_insert(xml, paragraph_id, run_index, url))
  }

  pub fn insert_footnote(&mut self, section: usize, paragraph_id: u32, run_index: usize, note_text: &str) -> HwpxResult<u32> {
    let note_id = self.id_gen.next_id();
    self.mutate_unlogged(section, |xml| {
      fields::apply_note_insert(xml, paragraph_id, run_index, fields::NoteKind::Footnote, note_id, note_text)
    })?;
    Ok(note_id)
  }

  pub fn insert_endnote(&mut self, section: usize, paragraph_id: u32, run_index: usize, note_text: &str) -> HwpxResult<u32> {
    let note_id = self.id_gen.next_id();
    self.mutate_unlogged(section, |xml| {
      fields::apply_note_insert(xml, paragraph_id, run_index, fields::NoteKind::Endnote, note_id, note_text)
    })?;
    Ok(note_id)
  }

  pub fn insert_memo(&mut self, section: usize, paragraph_id: u32, run_index: usize, text_content: &str) -> HwpxResult<u32> {
    let memo_id = self.id_gen.next_id();
    self.mutate_unlogged(section, |xml| {
      fields::apply_memo_insert(xml, paragraph_id, run_index, memo_id, text_content)
    })?;
    Ok(memo_id)
  }

  // ---- Structural -----------------------------------------------------------

  /// Inserts a new, near-empty section at `at_index`, shifting the index
  /// of every section from `at_index` on. The new section's `raw_xml` is a
  /// minimal `<hp:sec/>` skeleton; populating it with real content is the
  /// caller's job via the other facade verbs.
  pub fn insert_section(&mut self, at_index: usize) -> HwpxResult<()> {
    self.record_undo_point()?;
    let at_index = at_index.min(self.model.sections.len());
    let new_section = model::Section {
      index: at_index,
      raw_xml: b"<hp:sec></hp:sec>".to_vec(),
      original_xml: b"<hp:sec></hp:sec>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    };
    self.model.sections.insert(at_index, new_section);
    for (i, s) in self.model.sections.iter_mut().enumerate() {
      s.index = i;
    }
    self.dirty = true;
    Ok(())
  }

  pub fn delete_section(&mut self, index: usize) -> HwpxResult<()> {
    if index >= self.model.sections.len() {
      return Err(HwpxError::NotFound("section".into(), index.to_string()));
    }
    self.record_undo_point()?;
    self.model.sections.remove(index);
    for (i, s) in self.model.sections.iter_mut().enumerate() {
      s.index = i;
    }
    self.dirty = true;
    Ok(())
  }

  pub fn set_column_definition(&mut self, section: usize, count: u32, same_width: bool, gap_hwpunit: i64) -> HwpxResult<()> {
    self.record_undo_point()?;
    let s = self
      .model
      .sections
      .get_mut(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    s.column_definition = Some(model::ColumnDefinition { count, same_width, gap_hwpunit });
    self.dirty = true;
    Ok(())
  }

  pub fn set_page_settings(&mut self, section: usize, settings: model::PageSettings) -> HwpxResult<()> {
    self.record_undo_point()?;
    let s = self
      .model
      .sections
      .get_mut(section)
      .ok_or_else(|| HwpxError::NotFound("section".into(), section.to_string()))?;
    s.page_settings = Some(settings);
    self.dirty = true;
    Ok(())
  }

  /// Returns, in document order, the `id` and first run's text of every
  /// top-level paragraph in `section` — a flat outline view, since HWPX
  /// paragraphs carry no heading-level attribute this engine interprets.
  pub fn get_outline(&self, section: usize) -> HwpxResult<Vec<(u32, String)>> {
    let xml = self.section_xml(section)?;
    Ok(
      locator::find_all(xml, "p")
        .into_iter()
        .filter_map(|r| {
          let id: u32 = locator::attr_value(xml, r, "id")?.parse().ok()?;
          let text = locator::find_nth_within(xml, r.inner, "t", 0)
            .map(|t| String::from_utf8_lossy(&xml[t.inner.0..t.inner.1]).into_owned())
            .unwrap_or_default();
          Some((id, text))
        })
        .collect(),
    )
  }

  /// Returns one paragraph's full run list (id, optional `charPrIDRef` and
  /// text, for every run) rather than `get_outline`'s lossy
  /// id-plus-first-run-text view.
  pub fn get_paragraph(&self, section: usize, paragraph_id: u32) -> HwpxResult<Vec<(Option<u32>, String)>> {
    let xml = self.section_xml(section)?;
    let paragraph = locator::find_by_id(xml, "p", "id", &paragraph_id.to_string())
      .ok_or_else(|| HwpxError::NotFound("paragraph".into(), paragraph_id.to_string()))?;
    Ok(
      locator::find_all(&xml[paragraph.inner.0..paragraph.inner.1], "run")
        .into_iter()
        .map(|r| {
          let outer = (r.outer.0 + paragraph.inner.0, r.outer.1 + paragraph.inner.0);
          let inner = (r.inner.0 + paragraph.inner.0, r.inner.1 + paragraph.inner.0);
          let range = ElementRange { outer, inner, depth: r.depth, self_closing: r.self_closing };
          let char_pr_id_ref = locator::attr_value(xml, range, "charPrIDRef").and_then(|s| s.parse().ok());
          let text = locator::find_nth_within(xml, range.inner, "t", 0)
            .map(|t| String::from_utf8_lossy(&xml[t.inner.0..t.inner.1]).into_owned())
            .unwrap_or_default();
          (char_pr_id_ref, text)
        })
        .collect(),
    )
  }

  // ---- Raw escape hatches -------------------------------------------------

  pub fn get_section_xml(&self, section: usize) -> HwpxResult<Vec<u8>> {
    self.section_xml(section).map(|b| b.to_vec())
  }

  pub fn set_section_xml(&mut self, section: usize, xml: Vec<u8>) -> HwpxResult<()> {
    validator::check_structure(&xml).map_err(HwpxError::InvalidXmlInput)?;
    validator::require_balanced(&xml, "tbl")?;
    self.record_undo_point()?;
    *self.section_xml_mut(section)? = xml;
    self.dirty = true;
    Ok(())
  }

  // ---- Maintenance --------------------------------------------------------

  pub fn analyze_xml(&self, section: usize) -> HwpxResult<Vec<String>> {
    let xml = self.section_xml(section)?;
    let mut findings = Vec::new();
    for tag in ["tbl", "tr", "tc", "p", "run"] {
      let report = validator::check_balance(xml, tag);
      if !report.is_balanced() {
        findings.push(format!("<{}> unbalanced: {} opens, {} closes", tag, report.opens, report.closes));
      }
      for pos in validator::find_orphan_closers(xml, tag) {
        findings.push(format!("orphan </{}> at byte {}", tag, pos));
      }
    }
    Ok(findings)
  }

  /// Removes orphan `</…:tbl>` closers from `section`'s XML (spec §7: not
  /// fatal by itself, but only fixed on an explicit call, never silently
  /// during save).
  pub fn repair_xml(&mut self, section: usize) -> HwpxResult<usize> {
    self.record_undo_point()?;
    let current = self.section_xml(section)?;
    let before = validator::find_orphan_closers(current, "tbl").len();
    let repaired = validator::repair_orphan_closers(current, "tbl");
    *self.section_xml_mut(section)? = repaired;
    self.dirty = true;
    Ok(before)
  }

  // ---- Undo / redo --------------------------------------------------------

  pub fn undo(&mut self) -> HwpxResult<bool> {
    if let Some(restored) = self.undo.undo(&self.model)? {
      self.model = restored;
      if let Some(mark) = self.log_undo_marks.pop() {
        self.log_redo_tails.push(self.log.split_off(mark));
      }
      Ok(true)
    } else {
      Ok(false)
    }
  }

  pub fn redo(&mut self) -> HwpxResult<bool> {
    if let Some(restored) = self.undo.redo(&self.model)? {
      self.model = restored;
      if let Some(tail) = self.log_redo_tails.pop() {
        self.log_undo_marks.push(self.log.len());
        self.log.extend(tail);
      }
      Ok(true)
    } else {
      Ok(false)
    }
  }
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

/// Collects every table ID from the parsed `elements` view, used only to
/// seed the ID generator on load. Nested tables are not represented in the
/// typed model (see `Section::elements` doc comment) so this only sees
/// top-level ones; any nested table IDs already on disk are picked up when
/// `IdGenerator::seed` is re-run after the first raw-XML scan for `tbl`.
fn collect_table_ids(model: &model::Document) -> Vec<u32> {
  model
    .sections
    .iter()
    .flat_map(|section| &section.elements)
    .filter_map(|element| match element {
      model::Element::Table(table) => Some(table.id),
      _ => None,
    })
    .collect()
}

/// Rewrites the `id` attribute on a standalone `<hp:p ...>...</hp:p>` (or
/// self-closing `<hp:p .../>`) fragment's own opening tag, used by
/// `copy_paragraph` to give a copied subtree a fresh identity before it is
/// spliced back in.
fn retag_paragraph_id(fragment: &[u8], new_id: u32) -> Vec<u8> {
  let tag_end = memchr::memchr(b'>', fragment).map(|p| p + 1).unwrap_or(fragment.len());
  let tag_bytes = &fragment[..tag_end];
  match locator::find_attr_value_range(tag_bytes, "id") {
    Some((s, e)) => crate::mutators::splice(fragment, s, e, new_id.to_string().as_bytes()),
    None => fragment.to_vec(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc_with_section(xml: &[u8]) -> Document {
    let mut model = model::Document::new();
    model.sections.push(model::Section {
      index: 0,
      raw_xml: xml.to_vec(),
      original_xml: xml.to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    Document::from_model(model)
  }

  #[test]
  fn update_cell_logs_and_marks_dirty() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.update_cell(0, 1, 0, 0, "new", None).unwrap();
    assert!(doc.is_dirty());
    assert_eq!(doc.mutation_log_len(), 1);
    assert_eq!(doc.get_cell_text(0, 1, 0, 0).unwrap(), "new");
  }

  #[test]
  fn undo_restores_pre_edit_cell_text() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.update_cell(0, 1, 0, 0, "new", None).unwrap();
    assert!(doc.undo().unwrap());
    assert_eq!(doc.get_cell_text(0, 1, 0, 0).unwrap(), "old");
  }

  #[test]
  fn csv_export_reads_row_major_text() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:run><hp:t>a</hp:t></hp:run></hp:tc><hp:tc><hp:run><hp:t>b</hp:t></hp:run></hp:tc></hp:tr></hp:tbl>"#;
    let doc = doc_with_section(xml);
    assert_eq!(doc.csv_export(0, 1).unwrap(), "a,b\n");
  }

  #[test]
  fn missing_section_is_not_found() {
    let mut doc = Document::new();
    assert!(doc.update_cell(0, 1, 0, 0, "x", None).is_err());
  }

  #[test]
  fn insert_row_then_delete_row_round_trips_row_count() {
    let xml = br#"<hp:tbl id="1" rowCnt="1" colCnt="1"><hp:tr><hp:tc><hp:t>a</hp:t></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.insert_row(0, 1, 1, 1, 1000).unwrap();
    assert_eq!(doc.list_tables(0).unwrap(), vec![1]);
    doc.delete_row(0, 1, 1).unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    assert_eq!(hwpx_find_all_tr_count(&xml), 1);
  }

  fn hwpx_find_all_tr_count(xml: &[u8]) -> usize {
    locator::find_all(xml, "tr").len()
  }

  #[test]
  fn apply_character_style_rewrites_run_char_pr() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let mut doc = doc_with_section(xml);
    doc.apply_character_style(0, 1, 0, 42).unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    assert!(String::from_utf8(xml).unwrap().contains(r#"charPrIDRef="42""#));
  }

  #[test]
  fn copy_paragraph_mints_a_fresh_id() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let mut doc = doc_with_section(xml);
    let new_id = doc.copy_paragraph(0, 1).unwrap();
    assert_ne!(new_id, 1);
    let xml = doc.get_section_xml(0).unwrap();
    assert!(locator::find_by_id(&xml, "p", "id", "1").is_some());
    assert!(locator::find_by_id(&xml, "p", "id", &new_id.to_string()).is_some());
  }

  #[test]
  fn move_paragraph_reorders_without_changing_ids() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p><hp:p id="2"><hp:run><hp:t>b</hp:t></hp:run></hp:p>"#;
    let mut doc = doc_with_section(xml);
    doc.move_paragraph(0, 1, 2).unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    let text = String::from_utf8(xml).unwrap();
    assert!(text.find("id=\"2\"").unwrap() < text.find("id=\"1\"").unwrap());
  }

  #[test]
  fn insert_section_then_delete_section_restores_original_count() {
    let mut doc = Document::new();
    doc.model.sections.push(model::Section {
      index: 0,
      raw_xml: b"<hp:sec/>".to_vec(),
      original_xml: b"<hp:sec/>".to_vec(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });
    doc.insert_section(0).unwrap();
    assert_eq!(doc.model.sections.len(), 2);
    doc.delete_section(0).unwrap();
    assert_eq!(doc.model.sections.len(), 1);
  }

  #[test]
  fn get_outline_lists_paragraph_ids_and_text() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>Intro</hp:t></hp:run></hp:p>"#;
    let doc = doc_with_section(xml);
    let outline = doc.get_outline(0).unwrap();
    assert_eq!(outline, vec![(1, "Intro".to_string())]);
  }

  #[test]
  fn get_paragraph_lists_every_run_not_just_the_first() {
    let xml = br#"<hp:p id="1"><hp:run charPrIDRef="5"><hp:t>a</hp:t></hp:run><hp:run><hp:t>b</hp:t></hp:run></hp:p>"#;
    let doc = doc_with_section(xml);
    let runs = doc.get_paragraph(0, 1).unwrap();
    assert_eq!(runs, vec![(Some(5), "a".to_string()), (None, "b".to_string())]);
  }

  #[test]
  fn replace_all_honors_case_insensitive_literal_matching() {
    let xml = br#"<hp:p><hp:run><hp:t>FOO.bar</hp:t></hp:run></hp:p>"#;
    let mut doc = doc_with_section(xml);
    doc.replace_all(0, "foo.bar", "baz", false, false, None, Vec::new()).unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    assert!(String::from_utf8(xml).unwrap().contains("<hp:t>baz</hp:t>"));
  }

  #[test]
  fn insert_image_with_neither_dimension_uses_native_capped_size() {
    let xml = br#"<hp:p id="1"></hp:p>"#;
    let mut doc = doc_with_section(xml);
    let mut png = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    png.extend_from_slice(&[0u8; 24]);
    png[16..20].copy_from_slice(&100u32.to_be_bytes());
    png[20..24].copy_from_slice(&50u32.to_be_bytes());
    let pic_id = doc
      .insert_image(0, png, None, None, image::AspectRatioMode::NativeCapped, Some(1))
      .unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    assert!(locator::find_by_id(&xml, "pic", "id", &pic_id.to_string()).is_some());
  }

  #[test]
  fn repair_xml_counts_and_removes_orphan_closers() {
    let xml = br#"<hp:p></hp:tbl><hp:t>x</hp:t></hp:p>"#;
    let mut doc = doc_with_section(xml);
    let removed = doc.repair_xml(0).unwrap();
    assert_eq!(removed, 1);
    assert!(doc.analyze_xml(0).unwrap().is_empty());
  }

  #[test]
  fn insert_footnote_mints_an_id_and_embeds_note_text() {
    let xml = br#"<hp:p id="1"><hp:run><hp:t>a</hp:t></hp:run></hp:p>"#;
    let mut doc = doc_with_section(xml);
    let note_id = doc.insert_footnote(0, 1, 0, "see appendix").unwrap();
    let xml = doc.get_section_xml(0).unwrap();
    assert!(locator::find_by_id(&xml, "footnote", "id", &note_id.to_string()).is_some());
  }

  /// A structural verb with no mutation-log entry of its own (`insert_row`)
  /// interleaved with a logged one (`update_cell`) must not desynchronize
  /// the undo stack from the log: undoing the logged edit must drop only
  /// that one log entry, not leave a stale one behind or remove too many.
  #[test]
  fn undo_after_mixed_logged_and_unlogged_edits_drops_only_the_logged_entry() {
    let xml = br#"<hp:tbl id="1" rowCnt="1" colCnt="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.insert_row(0, 1, 1, 1, 1000).unwrap();
    doc.update_cell(0, 1, 0, 0, "new", None).unwrap();
    assert_eq!(doc.mutation_log_len(), 1);

    assert!(doc.undo().unwrap());
    assert_eq!(doc.mutation_log_len(), 0);
    assert_eq!(doc.get_cell_text(0, 1, 0, 0).unwrap(), "old");

    assert!(doc.undo().unwrap());
    assert_eq!(doc.mutation_log_len(), 0);
  }

  #[test]
  fn redo_restores_the_undone_logs_entry() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.update_cell(0, 1, 0, 0, "new", None).unwrap();
    assert!(doc.undo().unwrap());
    assert_eq!(doc.mutation_log_len(), 0);

    assert!(doc.redo().unwrap());
    assert_eq!(doc.mutation_log_len(), 1);
    assert_eq!(doc.get_cell_text(0, 1, 0, 0).unwrap(), "new");
  }

  #[test]
  fn mutation_log_in_apply_order_does_not_drain_the_log() {
    let xml = br#"<hp:tbl id="1"><hp:tr><hp:tc><hp:p><hp:run><hp:t>old</hp:t></hp:run></hp:p></hp:tc></hp:tr></hp:tbl>"#;
    let mut doc = doc_with_section(xml);
    doc.update_cell(0, 1, 0, 0, "new", None).unwrap();
    assert_eq!(doc.mutation_log_in_apply_order().len(), 1);
    assert_eq!(doc.mutation_log_len(), 1);
  }
}
