//! The pluggable source trait and the registry of configured sources.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use quill_text::{is_word_char, Document};

use crate::context::QueryContext;
use crate::types::{Candidate, SourceError};

/// Identity of a registered source within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) usize);

impl SourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// What a source hands back for one query.
#[derive(Debug)]
pub enum SourceReply {
    /// Candidates for the current position.
    Complete(SourceResult),
    /// The source has nothing to offer here. Not an error.
    Empty,
    /// The source is not ready yet (an index is still loading) and wants to
    /// be re-invoked on the next qualifying buffer change instead of being
    /// restarted from scratch.
    RetryLater,
}

/// One source's candidates for one query, plus the rule describing how long
/// they stay usable.
#[derive(Debug)]
pub struct SourceResult {
    /// Byte offset where the completed span starts; accept replaces
    /// `from..cursor`.
    pub from: usize,
    pub candidates: Vec<Candidate>,
    /// The result remains valid while the text in `from..cursor` fully
    /// matches this pattern. Without one, any buffer change invalidates the
    /// result and forces a re-query.
    pub valid_for: Option<Regex>,
}

impl SourceResult {
    pub fn new(from: usize, candidates: Vec<Candidate>) -> Self {
        Self {
            from,
            candidates,
            valid_for: None,
        }
    }

    pub fn with_valid_for(mut self, pattern: Regex) -> Self {
        self.valid_for = Some(pattern);
        self
    }

    /// Convenience for the common case: candidates stay valid while the user
    /// keeps typing an identifier-like word.
    pub fn valid_while_word(self) -> Self {
        // Compiled from a literal; cannot fail.
        self.with_valid_for(Regex::new(r"^\w*$").expect("static pattern"))
    }

    /// Whether this result still covers `cursor` in `doc`.
    ///
    /// `same_version` short-circuits the check for results computed against
    /// the live buffer state.
    pub(crate) fn is_valid_at(&self, doc: &Document, cursor: usize, same_version: bool) -> bool {
        if cursor < self.from {
            return false;
        }
        if same_version {
            return true;
        }
        let Some(span) = doc.slice(self.from..cursor) else {
            return false;
        };
        match &self.valid_for {
            Some(pattern) => pattern
                .find(span)
                .is_some_and(|m| m.start() == 0 && m.end() == span.len()),
            None => false,
        }
    }
}

/// A pluggable provider of completion candidates.
///
/// Sources are stateless from the engine's perspective; caching is their own
/// business. A query may be cancelled at any time via the context's token:
/// cooperative sources poll it, and results from non-cooperative sources are
/// discarded by the session's staleness check.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether this source wants to run at the context's position at all.
    /// Cheap pre-filter; the default accepts everything.
    fn is_applicable(&self, _cx: &QueryContext) -> bool {
        true
    }

    /// Produce candidates for the given context.
    async fn query(&self, cx: &QueryContext) -> Result<SourceReply, SourceError>;
}

/// A source plus its per-registration tuning.
#[derive(Clone)]
pub struct RegisteredSource {
    pub(crate) source: Arc<dyn CompletionSource>,
    /// Sources with higher priority rank their candidates above lower ones
    /// and win label dedup ties.
    pub(crate) priority: i32,
}

impl RegisteredSource {
    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Ordered collection of the sources a session queries.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with default priority 0.
    pub fn register(&mut self, source: Arc<dyn CompletionSource>) -> SourceId {
        self.register_with_priority(source, 0)
    }

    pub fn register_with_priority(
        &mut self,
        source: Arc<dyn CompletionSource>,
        priority: i32,
    ) -> SourceId {
        let id = SourceId(self.sources.len());
        self.sources.push(RegisteredSource { source, priority });
        id
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, id: SourceId) -> Option<&RegisteredSource> {
        self.sources.get(id.0)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (SourceId, &RegisteredSource)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(idx, source)| (SourceId(idx), source))
    }
}

/// A ready-made source completing words already present in the document.
///
/// Useful as a fallback when no semantic source applies, and as the
/// reference implementation of the source contract.
pub struct WordSource {
    min_word_len: usize,
}

impl WordSource {
    pub fn new() -> Self {
        Self { min_word_len: 3 }
    }

    pub fn with_min_word_len(min_word_len: usize) -> Self {
        Self { min_word_len }
    }
}

impl Default for WordSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionSource for WordSource {
    fn name(&self) -> &str {
        "words"
    }

    fn is_applicable(&self, cx: &QueryContext) -> bool {
        cx.explicit() || cx.token_before().is_some()
    }

    async fn query(&self, cx: &QueryContext) -> Result<SourceReply, SourceError> {
        let token = cx.token_before();
        let from = token.as_ref().map(|t| t.from).unwrap_or(cx.pos());

        let text = cx.doc().text();
        let mut words: Vec<&str> = Vec::new();
        let mut start = None;
        for (idx, ch) in text.char_indices() {
            if cx.is_cancelled() {
                return Ok(SourceReply::Empty);
            }
            if is_word_char(ch) {
                start.get_or_insert(idx);
            } else if let Some(word_start) = start.take() {
                words.push(&text[word_start..idx]);
            }
        }
        if let Some(word_start) = start {
            words.push(&text[word_start..]);
        }

        words.sort_unstable();
        words.dedup();

        let current = token.as_ref().map(|t| t.text.as_str());
        let candidates: Vec<Candidate> = words
            .into_iter()
            .filter(|word| word.len() >= self.min_word_len && Some(*word) != current)
            .map(|word| Candidate::new(word, crate::types::CandidateKind::Text))
            .collect();

        if candidates.is_empty() {
            return Ok(SourceReply::Empty);
        }
        Ok(SourceReply::Complete(
            SourceResult::new(from, candidates).valid_while_word(),
        ))
    }
}
