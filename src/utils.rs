use log::{debug, warn};
use quick_xml::events::Event;

/// True if `bytes` is ASCII whitespace only (used to decide whether a
/// scanned text node is worth treating as content vs. formatting noise).
pub(crate) fn is_blank(bytes: &[u8]) -> bool {
  bytes.iter().all(u8::is_ascii_whitespace)
}

pub(crate) fn discard_event(event: &Event, tag: &str) {
  debug!("discarded event while scanning <{}>: {:?}", tag, event)
}

pub(crate) fn unexpected_event(event: &Event, tag: &str) -> crate::error::HwpxError {
  warn!("unexpected event while scanning <{}>: {:?}", tag, event);
  crate::error::HwpxError::StructuralAnomaly(format!(
    "unexpected event while scanning <{}>: {:?}",
    tag, event
  ))
}

/// Strips a namespace prefix (`hp`, `hs`, `hc`, ...) from a tag or attribute
/// name, since HWPX parts use these interchangeably and locator/validator
/// code must match on local name only.
pub(crate) fn local_name(qname: &[u8]) -> &[u8] {
  match memchr::memchr(b':', qname) {
    Some(pos) => &qname[pos + 1..],
    None => qname,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_detection() {
    assert!(is_blank(b"   \t\n"));
    assert!(!is_blank(b"  x "));
  }

  #[test]
  fn strips_namespace_prefix() {
    assert_eq!(local_name(b"hp:tbl"), b"tbl");
    assert_eq!(local_name(b"hs:tbl"), b"tbl");
    assert_eq!(local_name(b"tbl"), b"tbl");
  }
}
