//! Line/rectangle/ellipse and equation insertion (spec §4.4 graphics
//! verbs). These mirror `mutators::image::apply_image_insert`'s shape
//! (wrap a new element in a paragraph, splice after an anchor paragraph or
//! at the front) but synthesize a self-contained drawing or equation
//! element instead of referencing a binary item.

use crate::error::{HwpxError, HwpxResult};
use crate::locator;
use crate::mutators::{escape_xml_text, splice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
  Line,
  Rectangle,
  Ellipse,
}

impl ShapeKind {
  fn tag(self) -> &'static str {
    match self {
      ShapeKind::Line => "line",
      ShapeKind::Rectangle => "rect",
      ShapeKind::Ellipse => "ellipse",
    }
  }
}

fn insertion_point(section_xml: &[u8], insert_after_paragraph_id: Option<u32>) -> HwpxResult<usize> {
  match insert_after_paragraph_id {
    Some(id) => {
      let range = locator::find_by_id(section_xml, "p", "id", &id.to_string())
        .ok_or_else(|| HwpxError::NotFound("paragraph".into(), id.to_string()))?;
      Ok(range.outer.1)
    }
    None => Ok(0),
  }
}

/// Inserts a `<hp:line>`/`<hp:rect>`/`<hp:ellipse>` shape, wrapped in its
/// own paragraph, sized per `width_hwpunit`/`height_hwpunit`.
pub fn apply_shape_insert(
  section_xml: &[u8],
  kind: ShapeKind,
  shape_id: u32,
  width_hwpunit: i64,
  height_hwpunit: i64,
  insert_after_paragraph_id: Option<u32>,
) -> HwpxResult<Vec<u8>> {
  let insert_at = insertion_point(section_xml, insert_after_paragraph_id)?;
  let tag = kind.tag();
  let element = format!(
    r#"<hp:p><hp:run><hp:{tag} id="{id}"><hp:sz width="{w}" height="{h}"/></hp:{tag}></hp:run></hp:p>"#,
    tag = tag,
    id = shape_id,
    w = width_hwpunit,
    h = height_hwpunit
  );
  Ok(splice(section_xml, insert_at, insert_at, element.as_bytes()))
}

/// Inserts an `<hp:equation>` element carrying the caller's script as its
/// literal (escaped) text content.
pub fn apply_equation_insert(
  section_xml: &[u8],
  equation_id: u32,
  script: &str,
  insert_after_paragraph_id: Option<u32>,
) -> HwpxResult<Vec<u8>> {
  let insert_at = insertion_point(section_xml, insert_after_paragraph_id)?;
  let element = format!(
    r#"<hp:p><hp:run><hp:equation id="{}"><hp:script>{}</hp:script></hp:equation></hp:run></hp:p>"#,
    equation_id,
    escape_xml_text(script)
  );
  Ok(splice(section_xml, insert_at, insert_at, element.as_bytes()))
}
