//! Undo/redo ring (spec §4.7): two capped stacks of serialized model
//! snapshots. Undo is model-only — it never reaches back into a save
//! that already happened, and does not reverse entries already drained
//! from the mutation log.

use crate::error::HwpxResult;
use crate::model::Document;

const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct UndoStack {
  capacity: usize,
  undo: Vec<Vec<u8>>,
  redo: Vec<Vec<u8>>,
}

impl UndoStack {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    UndoStack {
      capacity,
      undo: Vec::new(),
      redo: Vec::new(),
    }
  }

  /// Records `document`'s current state as the point to return to on the
  /// next `undo()`. Called before a mutating verb is applied. Pushing a new
  /// snapshot clears the redo stack, matching the usual editor convention
  /// that a fresh edit abandons any previously undone redo history.
  pub fn record(&mut self, document: &Document) -> HwpxResult<()> {
    let snapshot = postcard::to_allocvec(document)?;
    if self.undo.len() == self.capacity {
      self.undo.remove(0);
    }
    self.undo.push(snapshot);
    self.redo.clear();
    Ok(())
  }

  /// Restores the most recently recorded snapshot, pushing the document's
  /// current (pre-restore) state onto the redo stack. Returns `None` when
  /// there is nothing to undo. This only ever mutates the in-memory model:
  /// if a save already happened since the snapshot was taken, the bytes
  /// written to disk are not affected by calling this.
  pub fn undo(&mut self, current: &Document) -> HwpxResult<Option<Document>> {
    let Some(snapshot) = self.undo.pop() else {
      return Ok(None);
    };
    let redo_snapshot = postcard::to_allocvec(current)?;
    if self.redo.len() == self.capacity {
      self.redo.remove(0);
    }
    self.redo.push(redo_snapshot);
    let restored: Document = postcard::from_bytes(&snapshot)?;
    Ok(Some(restored))
  }

  pub fn redo(&mut self, current: &Document) -> HwpxResult<Option<Document>> {
    let Some(snapshot) = self.redo.pop() else {
      return Ok(None);
    };
    let undo_snapshot = postcard::to_allocvec(current)?;
    if self.undo.len() == self.capacity {
      self.undo.remove(0);
    }
    self.undo.push(undo_snapshot);
    let restored: Document = postcard::from_bytes(&snapshot)?;
    Ok(Some(restored))
  }

  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }
}

impl Default for UndoStack {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_a_single_edit() {
    let mut stack = UndoStack::new();
    let original = Document::new();
    stack.record(&original).unwrap();

    let mut edited = Document::new();
    edited.sections.push(crate::model::Section {
      index: 0,
      raw_xml: Vec::new(),
      original_xml: Vec::new(),
      column_definition: None,
      page_settings: None,
      header_text: None,
      footer_text: None,
      elements: Vec::new(),
    });

    let restored = stack.undo(&edited).unwrap().unwrap();
    assert_eq!(restored.sections.len(), original.sections.len());
    assert!(stack.can_redo());
  }

  #[test]
  fn caps_stack_at_capacity() {
    let mut stack = UndoStack::with_capacity(2);
    let doc = Document::new();
    stack.record(&doc).unwrap();
    stack.record(&doc).unwrap();
    stack.record(&doc).unwrap();
    assert_eq!(stack.undo.len(), 2);
  }

  #[test]
  fn undo_on_empty_stack_is_none() {
    let mut stack = UndoStack::new();
    assert!(stack.undo(&Document::new()).unwrap().is_none());
  }
}
