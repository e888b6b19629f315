//! Core data types shared across the completion engine.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quill_text::{Document, DocumentVersion, TextEdit};

/// Externally visible state of a completion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// No session is open.
    Inactive,
    /// A session is open and at least one source is still being queried.
    Pending,
    /// A session is open and every source has settled; candidates are final
    /// for the current buffer state.
    Active,
}

/// The kind tag attached to a candidate, used by hosts to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Text,
    Variable,
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Module,
    Property,
    Field,
    Constant,
    Keyword,
    Snippet,
}

/// What accepting a candidate does to the buffer.
#[derive(Clone)]
pub enum ApplyAction {
    /// Replace the completed span with literal text.
    Insert(String),
    /// Replace the completed span with a snippet template (`$1`,
    /// `${2:placeholder}`); the parsed tab stops are handed off to the
    /// snippet collaborator on accept.
    Template(String),
    /// Compute the edit against the buffer state at accept time. The
    /// function sees the current document, so its result is valid for the
    /// version it was called with.
    Edit(Arc<dyn Fn(&AcceptContext<'_>) -> TextEdit + Send + Sync>),
}

impl fmt::Debug for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Insert(text) => f.debug_tuple("Insert").field(text).finish(),
            ApplyAction::Template(text) => f.debug_tuple("Template").field(text).finish(),
            ApplyAction::Edit(_) => f.write_str("Edit(..)"),
        }
    }
}

/// Everything an [`ApplyAction::Edit`] callback may consult.
pub struct AcceptContext<'a> {
    /// The buffer state the accept is being validated against.
    pub doc: &'a Document,
    /// Start of the span being completed (the owning result's `from`).
    pub from: usize,
    /// Cursor position at accept time.
    pub cursor: usize,
    /// The candidate being accepted.
    pub candidate: &'a Candidate,
}

/// One completion suggestion as produced by a source. Immutable.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Display text; also the inserted text when no other apply action is
    /// given.
    pub label: String,
    pub kind: CandidateKind,
    /// Short annotation rendered next to the label (a type, a signature).
    pub detail: Option<String>,
    pub apply: ApplyAction,
    /// Ranking nudge within the owning source's priority band, -99..=99.
    pub boost: i8,
    /// Text matched against the typed prefix instead of the label.
    pub filter_text: Option<String>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, kind: CandidateKind) -> Self {
        let label = label.into();
        Self {
            apply: ApplyAction::Insert(label.clone()),
            label,
            kind,
            detail: None,
            boost: 0,
            filter_text: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_apply(mut self, apply: ApplyAction) -> Self {
        self.apply = apply;
        self
    }

    pub fn with_insert_text(mut self, text: impl Into<String>) -> Self {
        self.apply = ApplyAction::Insert(text.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.apply = ApplyAction::Template(template.into());
        self
    }

    pub fn with_boost(mut self, boost: i8) -> Self {
        self.boost = boost.clamp(-99, 99);
        self
    }

    pub fn with_filter_text(mut self, text: impl Into<String>) -> Self {
        self.filter_text = Some(text.into());
        self
    }

    /// The text the prefix filter matches against.
    pub fn filter_key(&self) -> &str {
        self.filter_text.as_deref().unwrap_or(&self.label)
    }
}

/// Failure of a single source. Recovered locally: the session logs it and
/// continues with the remaining sources.
#[derive(Debug, Error)]
#[error("completion source failed: {message}")]
pub struct SourceError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

/// Why an `accept` call did not produce an edit. All variants are surfaced as
/// a no-op: the buffer and cursor are left untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcceptError {
    #[error("candidate was computed against {computed} but the buffer is at {current} and the result did not revalidate")]
    Stale {
        computed: DocumentVersion,
        current: DocumentVersion,
    },

    #[error("no candidate is selected")]
    NoSelection,

    #[error("candidate index {index} out of range for list of {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("no completion session is open")]
    Closed,
}

/// Invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid completion config: {0}")]
    Invalid(String),

    #[error("unsupported config format: {0}")]
    UnknownFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_builder() {
        let candidate = Candidate::new("println", CandidateKind::Function)
            .with_detail("macro")
            .with_boost(5)
            .with_filter_text("println!");

        assert_eq!(candidate.label, "println");
        assert_eq!(candidate.detail.as_deref(), Some("macro"));
        assert_eq!(candidate.boost, 5);
        assert_eq!(candidate.filter_key(), "println!");
    }

    #[test]
    fn test_candidate_defaults_to_inserting_label() {
        let candidate = Candidate::new("foo", CandidateKind::Text);
        match &candidate.apply {
            ApplyAction::Insert(text) => assert_eq!(text, "foo"),
            other => panic!("unexpected apply action: {other:?}"),
        }
    }

    #[test]
    fn test_boost_is_clamped() {
        let candidate = Candidate::new("x", CandidateKind::Text).with_boost(127);
        assert_eq!(candidate.boost, 99);
    }

    #[test]
    fn test_source_error_preserves_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "index missing");
        let err = SourceError::with_cause("index load failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
