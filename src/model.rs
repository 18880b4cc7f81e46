//! The object model the facade operates on (spec §3). Populating this model
//! from an on-disk HWPX container on first load is the job of an external
//! semantic parser; this crate only shapes the types the mutation engine and
//! undo ring operate on afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Modern HWPX containers are a ZIP of XML parts this engine can edit;
/// legacy binary containers carry the same extension but a different
/// on-disk format entirely and are read-only here (spec §3/§7
/// `format-readonly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
  Modern,
  LegacyBinary,
}

/// A whole HWPX document: one or more sections, plus the style tables and
/// binary items shared across all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub format: ContainerFormat,
  pub sections: Vec<Section>,
  pub styles: StyleTables,
  pub binary_items: HashMap<String, BinaryItem>,
  /// Header-part metadata synchronized by literal substitution at save
  /// time (spec §4.6 step 3); `None` leaves the header's existing element
  /// untouched.
  pub title: Option<String>,
  pub creator: Option<String>,
  pub subject: Option<String>,
  pub description: Option<String>,
}

impl Document {
  pub fn new() -> Self {
    Document {
      format: ContainerFormat::Modern,
      sections: Vec::new(),
      styles: StyleTables::default(),
      binary_items: HashMap::new(),
      title: None,
      creator: None,
      subject: None,
      description: None,
    }
  }
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

/// One `section#.xml` part. `raw_xml` is the ground truth the mutators
/// splice against; `elements` is a best-effort parsed view maintained by an
/// external semantic parser for read access and is not required to be
/// perfectly in sync with `raw_xml` after every surgical edit — callers
/// that need the authoritative current structure should re-derive it from
/// `raw_xml` rather than trust a stale `elements` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
  pub index: usize,
  pub raw_xml: Vec<u8>,
  /// The section's bytes as they were the last time the mutation log was
  /// empty (load time, or immediately after the previous save). Logged
  /// verbs (spec §4.3's five variants) leave this untouched and only
  /// advance `raw_xml`; the save pipeline replays the drained log against
  /// this baseline rather than trusting `raw_xml` directly, so the log is
  /// the thing that actually produces the saved bytes, not bookkeeping
  /// alongside an already-mutated copy. Non-logged verbs advance both
  /// fields together since they have no log entry to replay.
  pub original_xml: Vec<u8>,
  pub column_definition: Option<ColumnDefinition>,
  pub page_settings: Option<PageSettings>,
  pub header_text: Option<String>,
  pub footer_text: Option<String>,
  pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
  pub count: u32,
  pub same_width: bool,
  pub gap_hwpunit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSettings {
  pub width_hwpunit: i64,
  pub height_hwpunit: i64,
  pub margin_left_hwpunit: i64,
  pub margin_right_hwpunit: i64,
  pub margin_top_hwpunit: i64,
  pub margin_bottom_hwpunit: i64,
}

/// A tagged-variant element in place of the teacher's dynamic-dispatch
/// VOTable element tree: HWPX's element set is closed, so a tagged enum
/// expresses it without a trait object per spec §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
  Paragraph(Paragraph),
  Table(Table),
  Image(Image),
  Line(Shape),
  Rectangle(Shape),
  Ellipse(Shape),
  Equation(Equation),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
  pub id: u32,
  pub para_pr_id_ref: Option<u32>,
  pub style_id_ref: Option<u32>,
  pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
  pub char_pr_id_ref: Option<u32>,
  pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
  pub id: u32,
  pub rows: Vec<Row>,
  pub col_count: u32,
  pub row_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
  pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
  pub col_addr: u32,
  pub row_addr: u32,
  pub col_span: u32,
  pub row_span: u32,
  pub char_pr_id_ref: Option<u32>,
  pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
  pub id: u32,
  pub bin_item_id: String,
  pub width_hwpunit: i64,
  pub height_hwpunit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
  pub id: u32,
  pub width_hwpunit: i64,
  pub height_hwpunit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
  pub id: u32,
  pub script: String,
}

/// Decoded binary payload for an image part, kept base64-held in memory
/// until save time (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryItem {
  pub id: String,
  pub extension: String,
  pub data_base64: String,
}

/// Interned style catalogs, keyed by the integer IDs HWPX headers use.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StyleTables {
  pub char_shapes: HashMap<u32, CharShape>,
  pub para_shapes: HashMap<u32, ParaShape>,
  pub named_styles: HashMap<u32, NamedStyle>,
  pub border_fills: HashMap<u32, BorderFill>,
  pub fonts: HashMap<u32, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharShape {
  pub height_hwpunit: i64,
  pub bold: bool,
  pub italic: bool,
  pub font_id_ref: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParaShape {
  pub align: String,
  pub line_spacing_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedStyle {
  pub name: String,
  pub para_pr_id_ref: Option<u32>,
  pub char_pr_id_ref: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderFill {
  pub fill_color: Option<String>,
  pub border_color: Option<String>,
}
