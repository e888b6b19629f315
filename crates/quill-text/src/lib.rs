//! Text-buffer data model shared between the Quill completion engine and its
//! host editor.
//!
//! The engine never owns the buffer. The host hands it immutable, versioned
//! [`Document`] snapshots and describes every applied edit as a
//! [`DocumentChange`]; the engine hands back a single [`TextEdit`] when a
//! completion is accepted. Versions are the currency used to detect that a
//! result was computed against a buffer state that no longer exists.

pub mod document;
pub mod words;

pub use document::{Document, DocumentChange, DocumentVersion, EditError, TextEdit};
pub use words::{is_word_char, word_prefix, word_start_before};
