//! Immutable document snapshots and edit deltas.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonically increasing identity of a buffer state.
///
/// Every applied edit produces a new version. Two snapshots with the same
/// version hold the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    pub const INITIAL: DocumentVersion = DocumentVersion(0);

    pub fn next(self) -> DocumentVersion {
        DocumentVersion(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Errors raised when an edit cannot be applied to a snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit range {start}..{end} is out of bounds for document of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("offset {at} is not a char boundary")]
    NotCharBoundary { at: usize },
}

/// A single replacement: delete `range`, insert `insert` in its place.
///
/// Offsets are byte offsets into the document text and must fall on char
/// boundaries. An insertion has an empty range; a deletion has empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub insert: String,
}

impl TextEdit {
    pub fn new(range: Range<usize>, insert: impl Into<String>) -> Self {
        Self {
            range,
            insert: insert.into(),
        }
    }

    /// An insertion at a single offset.
    pub fn insert_at(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }

    /// A deletion of `range` with no replacement text.
    pub fn delete(range: Range<usize>) -> Self {
        Self::new(range, "")
    }

    /// Net change in document length, in bytes.
    pub fn len_delta(&self) -> isize {
        self.insert.len() as isize - (self.range.end - self.range.start) as isize
    }

    /// Maps a position through this edit.
    ///
    /// Positions before the edited range are unchanged, positions after it
    /// shift by the length delta. Returns `None` for positions inside the
    /// replaced range, whose mapping is ambiguous.
    pub fn map_pos(&self, pos: usize) -> Option<usize> {
        if pos <= self.range.start {
            Some(pos)
        } else if pos >= self.range.end {
            Some((pos as isize + self.len_delta()) as usize)
        } else {
            None
        }
    }
}

/// An edit the host has already applied, plus the resulting cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub edit: TextEdit,
    pub cursor: usize,
}

impl DocumentChange {
    pub fn new(edit: TextEdit, cursor: usize) -> Self {
        Self { edit, cursor }
    }

    /// The single character this change typed at the cursor, if it is a plain
    /// one-character insertion. Pastes, deletions, and replacements return
    /// `None`.
    pub fn typed_char(&self) -> Option<char> {
        if !self.range_is_empty() {
            return None;
        }
        let mut chars = self.edit.insert.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(ch),
            _ => None,
        }
    }

    /// True when the change removed text without inserting any.
    pub fn is_deletion(&self) -> bool {
        self.edit.insert.is_empty() && !self.range_is_empty()
    }

    fn range_is_empty(&self) -> bool {
        self.edit.range.start == self.edit.range.end
    }
}

/// An immutable snapshot of the buffer at one version.
///
/// Snapshots share their text via `Arc`, so cloning one into a query context
/// is cheap and the text a source reads can never change underneath it.
#[derive(Debug, Clone)]
pub struct Document {
    text: Arc<str>,
    version: DocumentVersion,
}

impl Document {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            version: DocumentVersion::INITIAL,
        }
    }

    pub fn with_version(text: impl Into<Arc<str>>, version: DocumentVersion) -> Self {
        Self {
            text: text.into(),
            version,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> DocumentVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The text in `range`, or `None` if the range is out of bounds or does
    /// not fall on char boundaries.
    pub fn slice(&self, range: Range<usize>) -> Option<&str> {
        self.text.get(range)
    }

    /// Applies an edit, producing the successor snapshot with a bumped
    /// version.
    pub fn apply(&self, edit: &TextEdit) -> Result<Document, EditError> {
        let len = self.text.len();
        if edit.range.start > edit.range.end || edit.range.end > len {
            return Err(EditError::OutOfBounds {
                start: edit.range.start,
                end: edit.range.end,
                len,
            });
        }
        if !self.text.is_char_boundary(edit.range.start) {
            return Err(EditError::NotCharBoundary {
                at: edit.range.start,
            });
        }
        if !self.text.is_char_boundary(edit.range.end) {
            return Err(EditError::NotCharBoundary { at: edit.range.end });
        }

        let mut text = String::with_capacity(
            (len as isize + edit.len_delta()).max(0) as usize,
        );
        text.push_str(&self.text[..edit.range.start]);
        text.push_str(&edit.insert);
        text.push_str(&self.text[edit.range.end..]);

        Ok(Document {
            text: text.into(),
            version: self.version.next(),
        })
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.text == other.text
    }
}

impl Eq for Document {}
