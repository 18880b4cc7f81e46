//! Style table lookups and deduplicated inserts, grounded on the XLSX style
//! editor's index-or-create pattern: a new style is only added to the
//! catalog when an equivalent one is not already interned.

use crate::model::{CharShape, NamedStyle, ParaShape, StyleTables};

impl StyleTables {
  /// Returns the ID of a `CharShape` equal to `shape`, interning it under a
  /// fresh ID (one past the current maximum) if no equal entry exists yet.
  pub fn char_shape_id_for(&mut self, shape: CharShape) -> u32 {
    if let Some((&id, _)) = self
      .char_shapes
      .iter()
      .find(|(_, existing)| shapes_equal(existing, &shape))
    {
      return id;
    }
    let id = self.char_shapes.keys().copied().max().map_or(0, |m| m + 1);
    self.char_shapes.insert(id, shape);
    id
  }

  pub fn named_style_id_for(&self, name: &str) -> Option<u32> {
    self
      .named_styles
      .iter()
      .find(|(_, style)| style.name == name)
      .map(|(&id, _)| id)
  }

  pub fn insert_named_style(&mut self, style: NamedStyle) -> u32 {
    let id = self.named_styles.keys().copied().max().map_or(0, |m| m + 1);
    self.named_styles.insert(id, style);
    id
  }

  pub fn para_shape(&self, id: u32) -> Option<&ParaShape> {
    self.para_shapes.get(&id)
  }
}

fn shapes_equal(a: &CharShape, b: &CharShape) -> bool {
  a.height_hwpunit == b.height_hwpunit
    && a.bold == b.bold
    && a.italic == b.italic
    && a.font_id_ref == b.font_id_ref
}

#[cfg(test)]
mod tests {
  use super::*;

  fn shape(height: i64) -> CharShape {
    CharShape {
      height_hwpunit: height,
      bold: false,
      italic: false,
      font_id_ref: None,
    }
  }

  #[test]
  fn reuses_an_equal_char_shape() {
    let mut styles = StyleTables::default();
    let first = styles.char_shape_id_for(shape(1000));
    let second = styles.char_shape_id_for(shape(1000));
    assert_eq!(first, second);
    assert_eq!(styles.char_shapes.len(), 1);
  }

  #[test]
  fn distinct_shapes_get_distinct_ids() {
    let mut styles = StyleTables::default();
    let a = styles.char_shape_id_for(shape(1000));
    let b = styles.char_shape_id_for(shape(2000));
    assert_ne!(a, b);
  }
}
