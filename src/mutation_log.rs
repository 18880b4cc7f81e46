//! Append-only typed log of pending edits (spec §4.3). Entries are drained
//! at save time in a fixed cross-kind order, and in index-descending order
//! within a kind, so earlier splices in a pass never invalidate byte
//! offsets a later splice in the same pass still needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MutationEntry {
  CellUpdate {
    section: usize,
    table_id: u32,
    row: u32,
    col: u32,
    new_text: String,
    char_pr_id_ref: Option<u32>,
  },
  NestedTableInsert {
    section: usize,
    parent_table_id: u32,
    row: u32,
    col: u32,
    rows: u32,
    cols: u32,
    /// The ID already minted (and returned to the caller) for the inserted
    /// table, carried here so replaying this entry against the baseline
    /// bytes reproduces the exact same subtree rather than minting a
    /// second, different ID.
    new_table_id: u32,
  },
  DirectTextUpdate {
    section: usize,
    paragraph_id: u32,
    run_index: usize,
    new_text: String,
  },
  TextReplacement {
    section: usize,
    pattern: String,
    replacement: String,
    /// Literal substring match when `false`; regex match when `true`
    /// (spec §4.4's "optionally... regex").
    is_regex: bool,
    case_sensitive: bool,
    /// A single specific cell to scope the replacement to; takes
    /// precedence over `include_tables`/`exclude_tables` when set.
    cell_scope: Option<(u32, u32, u32)>,
    /// Table IDs the replacement is scoped to. `None` means unscoped
    /// (every cell plus body text); `Some(include)` restricts the
    /// replacement to those tables; entries in `exclude` are skipped even
    /// when also named in `include`.
    include_tables: Option<Vec<u32>>,
    exclude_tables: Vec<u32>,
  },
  ImageInsert {
    section: usize,
    bin_item_id: String,
    width_hwpunit: i64,
    height_hwpunit: i64,
    insert_after_paragraph_id: Option<u32>,
    /// The ID already minted for the inserted `<hp:pic>`, carried for the
    /// same reason as `NestedTableInsert::new_table_id`.
    pic_id: u32,
  },
}

impl MutationEntry {
  /// The fixed cross-kind application order named in spec §4.3: cell
  /// updates, then nested-table inserts, then direct text updates, then
  /// text replacements, then image inserts, with metadata sync running
  /// after all of them.
  fn kind_rank(&self) -> u8 {
    match self {
      MutationEntry::CellUpdate { .. } => 0,
      MutationEntry::NestedTableInsert { .. } => 1,
      MutationEntry::DirectTextUpdate { .. } => 2,
      MutationEntry::TextReplacement { .. } => 3,
      MutationEntry::ImageInsert { .. } => 4,
    }
  }

  /// A within-kind ordering key; for kinds that touch a specific row/col or
  /// paragraph position, higher values apply first, so earlier splices
  /// within the same element never shift an offset a later splice depends
  /// on.
  fn order_key(&self) -> i64 {
    match self {
      MutationEntry::CellUpdate { row, col, .. } => (*row as i64) * 100_000 + *col as i64,
      MutationEntry::NestedTableInsert { row, col, .. } => (*row as i64) * 100_000 + *col as i64,
      MutationEntry::DirectTextUpdate { run_index, .. } => *run_index as i64,
      MutationEntry::TextReplacement { .. } => 0,
      MutationEntry::ImageInsert { .. } => 0,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationLog {
  entries: Vec<MutationEntry>,
}

impl MutationLog {
  pub fn new() -> Self {
    MutationLog::default()
  }

  pub fn push(&mut self, entry: MutationEntry) {
    self.entries.push(entry);
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Removes and returns every entry from `at` onward, preserving their
  /// relative order, so an undo can stash them for a later redo rather
  /// than discarding them outright.
  pub fn split_off(&mut self, at: usize) -> Vec<MutationEntry> {
    self.entries.split_off(at)
  }

  /// Appends previously split-off entries back onto the log, restoring
  /// them in the order they were removed.
  pub fn extend(&mut self, entries: Vec<MutationEntry>) {
    self.entries.extend(entries);
  }

  /// Drains the log in apply order: grouped by kind per the fixed
  /// cross-kind order, and within a kind, index/position-descending so a
  /// pass applies back-to-front.
  pub fn drain_in_apply_order(&mut self) -> Vec<MutationEntry> {
    let entries = self.clone_in_apply_order();
    self.entries.clear();
    entries
  }

  /// Same ordering as `drain_in_apply_order` but leaves the log untouched,
  /// so a caller can trial-replay it and only actually drain once the
  /// replay is known to succeed.
  pub fn clone_in_apply_order(&self) -> Vec<MutationEntry> {
    let mut entries = self.entries.clone();
    entries.sort_by(|a, b| {
      a.kind_rank()
        .cmp(&b.kind_rank())
        .then(b.order_key().cmp(&a.order_key()))
    });
    entries
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drains_in_fixed_kind_order() {
    let mut log = MutationLog::new();
    log.push(MutationEntry::ImageInsert {
      section: 0,
      bin_item_id: "image1.png".into(),
      width_hwpunit: 100,
      height_hwpunit: 100,
      insert_after_paragraph_id: None,
      pic_id: 1,
    });
    log.push(MutationEntry::CellUpdate {
      section: 0,
      table_id: 1,
      row: 0,
      col: 0,
      new_text: "x".into(),
      char_pr_id_ref: None,
    });
    let drained = log.drain_in_apply_order();
    assert!(matches!(drained[0], MutationEntry::CellUpdate { .. }));
    assert!(matches!(drained[1], MutationEntry::ImageInsert { .. }));
    assert!(log.is_empty());
  }

  #[test]
  fn cell_updates_apply_index_descending_within_kind() {
    let mut log = MutationLog::new();
    log.push(MutationEntry::CellUpdate {
      section: 0,
      table_id: 1,
      row: 0,
      col: 0,
      new_text: "first".into(),
      char_pr_id_ref: None,
    });
    log.push(MutationEntry::CellUpdate {
      section: 0,
      table_id: 1,
      row: 2,
      col: 0,
      new_text: "second".into(),
      char_pr_id_ref: None,
    });
    let drained = log.drain_in_apply_order();
    match &drained[0] {
      MutationEntry::CellUpdate { row, .. } => assert_eq!(*row, 2),
      _ => unreachable!(),
    }
  }
}
