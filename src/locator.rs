//! Byte-range location of elements inside a raw HWPX XML part (spec §4.1).
//!
//! Nothing here parses into the object model: it only answers "where, as a
//! half-open byte range into the original buffer, does this element (or
//! this attribute's value) live", so a mutator can splice new bytes in
//! without touching anything outside that range.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::utils::local_name;

/// A located element: `outer` spans the full `<tag ...>...</tag>` (or the
/// whole self-closing tag), `inner` spans the content between start and end
/// tags (empty and equal to `outer.end` for self-closing tags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRange {
  pub outer: (usize, usize),
  pub inner: (usize, usize),
  pub depth: usize,
  pub self_closing: bool,
}

/// Scans `xml` depth-first for every element whose local name (namespace
/// prefix stripped) equals `tag_local`, regardless of which of `hp`/`hs`/`hc`
/// prefix is in use.
pub fn find_all(xml: &[u8], tag_local: &str) -> Vec<ElementRange> {
  let wanted = tag_local.as_bytes();
  let mut reader = Reader::from_reader(xml);
  reader.check_end_names(false);
  reader.trim_text(false);

  let mut out = Vec::new();
  let mut depth = 0usize;
  // stack of (start offset of '<', depth) for currently-open wanted tags
  let mut open_stack: Vec<(usize, usize)> = Vec::new();
  let mut buf = Vec::new();

  loop {
    let pos_before = reader.buffer_position();
    match reader.read_event(&mut buf) {
      Ok(Event::Start(ref e)) => {
        if local_name(e.name()) == wanted {
          open_stack.push((pos_before, depth));
        }
        depth += 1;
      }
      Ok(Event::End(ref e)) => {
        depth = depth.saturating_sub(1);
        if local_name(e.name()) == wanted {
          if let Some((start, d)) = open_stack.pop() {
            let end = reader.buffer_position();
            // inner content sits strictly between the '>' of the start tag
            // and the '<' of the end tag; approximate via byte scan since
            // quick-xml does not expose the start-tag's own end offset here.
            let inner_start = match memchr::memchr(b'>', &xml[start..end]) {
              Some(rel) => start + rel + 1,
              None => start,
            };
            let inner_end = match memchr::memrchr(b'<', &xml[inner_start..end]) {
              Some(rel) => inner_start + rel,
              None => end,
            };
            out.push(ElementRange {
              outer: (start, end),
              inner: (inner_start, inner_end),
              depth: d,
              self_closing: false,
            });
          }
        }
      }
      Ok(Event::Empty(ref e)) => {
        if local_name(e.name()) == wanted {
          let end = reader.buffer_position();
          out.push(ElementRange {
            outer: (pos_before, end),
            inner: (end, end),
            depth,
            self_closing: true,
          });
        }
      }
      Ok(Event::Eof) => break,
      Err(_) => break,
      _ => {}
    }
    buf.clear();
  }

  out
}

/// Locates a single element of `tag_local` whose `id_attr` equals `id`.
/// Not found is non-fatal: callers get `None` and decide whether that is an
/// error for their call site.
pub fn find_by_id(xml: &[u8], tag_local: &str, id_attr: &str, id: &str) -> Option<ElementRange> {
  find_all(xml, tag_local)
    .into_iter()
    .find(|range| attr_value(xml, *range, id_attr).as_deref() == Some(id))
}

/// Locates the nth (0-based) element of `tag_local`, in document order.
pub fn find_by_index(xml: &[u8], tag_local: &str, index: usize) -> Option<ElementRange> {
  find_all(xml, tag_local).into_iter().nth(index)
}

/// Locates the nth (0-based) element of `tag_local` within a previously
/// located element's byte range (e.g. the rows of a table, the cells of a
/// row), translating the nested scan's offsets back into `xml`-absolute
/// ones. Mutators and the document facade both narrow their search this
/// way when walking into a located element's children.
pub fn find_nth_within(xml: &[u8], outer: (usize, usize), tag_local: &str, index: usize) -> Option<ElementRange> {
  find_all(&xml[outer.0..outer.1], tag_local)
    .into_iter()
    .nth(index)
    .map(|r| ElementRange {
      outer: (r.outer.0 + outer.0, r.outer.1 + outer.0),
      inner: (r.inner.0 + outer.0, r.inner.1 + outer.0),
      depth: r.depth,
      self_closing: r.self_closing,
    })
}

/// Reads the decoded value of `attr_name` on the start (or empty) tag of a
/// located element, re-parsing only that single tag's bytes.
pub fn attr_value(xml: &[u8], range: ElementRange, attr_name: &str) -> Option<String> {
  let tag_end = if range.self_closing {
    range.outer.1
  } else {
    range.inner.0
  };
  let tag_bytes = &xml[range.outer.0..tag_end];
  let mut reader = Reader::from_reader(tag_bytes);
  reader.check_end_names(false);
  let mut buf = Vec::new();
  let event = reader.read_event(&mut buf).ok()?;
  let attrs = match event {
    Event::Start(ref e) => e.attributes(),
    Event::Empty(ref e) => e.attributes(),
    _ => return None,
  };
  for attr in attrs.flatten() {
    if local_name(attr.key) == attr_name.as_bytes() {
      return attr.unescape_and_decode_value(&reader).ok();
    }
  }
  None
}

/// Finds the exact byte range of `attr_name`'s *value* (the bytes between
/// the surrounding quotes) within a single tag's byte range, so a caller can
/// splice a replacement value in without touching the rest of the tag.
/// Mirrors the whitespace-boundary-checked scan used to avoid `count`
/// matching inside `uniqueCount` in spreadsheet shared-strings editing.
pub fn find_attr_value_range(tag_bytes: &[u8], attr_name: &str) -> Option<(usize, usize)> {
  let needle = attr_name.as_bytes();
  let mut search_from = 0usize;
  while let Some(rel) = memchr::memmem::find(&tag_bytes[search_from..], needle) {
    let start = search_from + rel;
    let before_ok = start == 0 || tag_bytes[start - 1].is_ascii_whitespace() || tag_bytes[start - 1] == b':';
    let after = start + needle.len();
    if before_ok && after < tag_bytes.len() {
      let mut cursor = after;
      while cursor < tag_bytes.len() && tag_bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
      }
      if cursor < tag_bytes.len() && tag_bytes[cursor] == b'=' {
        cursor += 1;
        while cursor < tag_bytes.len() && tag_bytes[cursor].is_ascii_whitespace() {
          cursor += 1;
        }
        if cursor < tag_bytes.len() && (tag_bytes[cursor] == b'"' || tag_bytes[cursor] == b'\'') {
          let quote = tag_bytes[cursor];
          let value_start = cursor + 1;
          if let Some(rel_end) = memchr::memchr(quote, &tag_bytes[value_start..]) {
            return Some((value_start, value_start + rel_end));
          }
        }
      }
    }
    search_from = start + needle.len();
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &[u8] =
    br#"<hp:p><hp:tbl id="100"><hp:tr><hp:tc><hp:tbl id="200"></hp:tbl></hp:tc></hp:tr></hp:tbl></hp:p>"#;

  #[test]
  fn finds_top_level_and_nested_tables() {
    let found = find_all(SAMPLE, "tbl");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].depth, 1);
    assert_eq!(found[1].depth, 3);
  }

  #[test]
  fn finds_by_id_regardless_of_nesting() {
    let outer = find_by_id(SAMPLE, "tbl", "id", "100").unwrap();
    let inner = find_by_id(SAMPLE, "tbl", "id", "200").unwrap();
    assert_eq!(attr_value(SAMPLE, outer, "id").as_deref(), Some("100"));
    assert_eq!(attr_value(SAMPLE, inner, "id").as_deref(), Some("200"));
  }

  #[test]
  fn missing_id_is_none_not_error() {
    assert!(find_by_id(SAMPLE, "tbl", "id", "999").is_none());
  }

  #[test]
  fn attr_value_range_skips_prefix_collisions() {
    let tag = br#"<x uniqueCount="7" count="3">"#;
    let (s, e) = find_attr_value_range(tag, "count").unwrap();
    assert_eq!(&tag[s..e], b"3");
  }
}
