use quick_error::quick_error;

quick_error! {
  /// Every failure mode the engine can surface, grouped the way the
  /// dispositions in the error handling table expect: some are meant to be
  /// returned to the caller, some degrade to a logged warning upstream of
  /// this type, some abort a save.
  #[derive(Debug)]
  pub enum HwpxError {
    /// A table, paragraph, row, cell or image ID could not be located.
    NotFound(what: String, id: String) {
      display("{} not found: {}", what, id)
    }
    /// The part being mutated is read-only for this document (no backing
    /// container, or the part is outside the set this engine understands).
    FormatReadOnly(part: String) {
      display("part is read-only: {}", part)
    }
    /// Caller-supplied XML fragment (e.g. nested table content, raw section
    /// XML) failed to parse as well-formed XML.
    InvalidXmlInput(reason: String) {
      display("invalid XML input: {}", reason)
    }
    /// The located region does not have the shape the mutator expected
    /// (e.g. a `tbl` without the expected `tr`/`tc` substructure).
    StructuralAnomaly(reason: String) {
      display("structural anomaly: {}", reason)
    }
    /// The validator found more open than close tags (or vice versa) for
    /// a scanned element.
    TagImbalance(tag: String, opens: usize, closes: usize) {
      display("tag imbalance in <{}>: {} opens, {} closes", tag, opens, closes)
    }
    /// Re-reading the freshly emitted archive failed validation; the save
    /// is aborted and the original bytes are left untouched.
    SaveVerificationFailed(reason: String) {
      display("save verification failed: {}", reason)
    }
    /// The injected diagram-rendering collaborator failed. Modeled here
    /// rather than as a live network error, since transport is out of
    /// scope for this crate.
    Render(reason: String) {
      display("render failed: {}", reason)
    }
    Xml(err: quick_xml::Error) {
      display("XML error: {}", err)
      from()
    }
    Zip(err: zip::result::ZipError) {
      display("zip error: {}", err)
      from()
    }
    Io(err: std::io::Error) {
      display("I/O error: {}", err)
      from()
    }
    Utf8(err: std::str::Utf8Error) {
      display("UTF-8 error: {}", err)
      from()
    }
    FromUtf8(err: std::string::FromUtf8Error) {
      display("UTF-8 error: {}", err)
      from()
    }
    ParseInt(err: std::num::ParseIntError) {
      display("integer parse error: {}", err)
      from()
    }
    Postcard(err: postcard::Error) {
      display("snapshot (de)serialization error: {}", err)
      from()
    }
    Custom(msg: String) {
      display("{}", msg)
    }
  }
}

pub type HwpxResult<T> = Result<T, HwpxError>;
