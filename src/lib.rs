//! Surgical XML mutation engine for the HWPX word-processor container
//! format. The engine locates and splices only the bytes a mutating verb
//! actually changes, instead of parsing an XML part into a tree and
//! re-serializing the whole thing, so editor-specific opaque bytes (line
//! segment arrays, rendering matrices, border-fill catalogs) a typed parse
//! cannot round-trip faithfully are never disturbed outside the touched
//! region.
//!
//! The document facade ([`document::Document`]) is the entry point most
//! callers want; [`locator`], [`validator`] and [`mutators`] are exposed
//! for callers building their own mutating verbs on top of the same
//! byte-range primitives.

pub mod atomic_write;
pub mod document;
pub mod error;
pub mod id_gen;
pub mod locator;
pub mod model;
pub mod mutation_log;
pub mod mutators;
pub mod registry;
pub mod save;
pub mod style;
pub mod typography;
pub mod undo;
mod utils;
pub mod validator;
pub mod zip_container;

pub use document::Document;
pub use error::{HwpxError, HwpxResult};
pub use registry::{DocumentHandle, DocumentRegistry};
