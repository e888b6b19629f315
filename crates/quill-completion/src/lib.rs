//! Quill Completion Engine
//!
//! An editor-agnostic autocompletion engine with pluggable asynchronous
//! sources. The host feeds it buffer and selection events; the engine
//! decides when to query, keeps concurrent source invocations consistent
//! with a moving buffer, and exposes one ranked, deduplicated candidate
//! list plus an accept action.
//!
//! # Architecture
//!
//! Work flows through a small set of components:
//!
//! 1. **Scheduler** ([`scheduler`]): classifies buffer changes and debounces
//!    implicit triggers so a burst of typing costs one query wave.
//! 2. **Sources** ([`source`]): pluggable [`CompletionSource`]
//!    implementations queried with an immutable [`QueryContext`] snapshot.
//! 3. **Runner** (`runner`, internal): drives each invocation on its own
//!    task, reporting exactly one generation-tagged outcome per query.
//! 4. **Session** ([`session`]): the state machine owning per-source
//!    lifecycles, staleness discards, selection, and accept validation.
//! 5. **Merge** ([`merge`]): fuzzy-filters, ranks, and deduplicates the
//!    resolved results into the public list.
//!
//! # Consistency guarantees
//!
//! - The visible list only ever contains candidates whose validity span
//!   covers the current cursor; a superseded result is unobservable even
//!   before its runner notices the cancellation.
//! - At most one invocation per source is in flight; a new trigger cancels
//!   the old query before starting the next.
//! - Accepting a candidate re-validates it against the live buffer version;
//!   a stale accept is a reported no-op, never a misapplied edit.
//!
//! # Example
//!
//! ```ignore
//! use quill_completion::{CompletionConfig, CompletionSession, SourceRegistry, WordSource};
//! use quill_text::Document;
//! use std::sync::Arc;
//!
//! let mut registry = SourceRegistry::new();
//! registry.register(Arc::new(WordSource::new()));
//!
//! let mut session = CompletionSession::new(CompletionConfig::default(), registry)?;
//!
//! // Host event loop: forward edits, pump outcomes, render the list.
//! session.start_completion(Document::new("let value = va"), 14);
//! session.pump();
//! for candidate in session.candidates() {
//!     println!("{}", candidate.label());
//! }
//! ```

pub mod config;
pub mod context;
pub mod merge;
mod runner;
pub mod scheduler;
pub mod session;
pub mod snippet;
pub mod source;
pub mod types;

pub use config::{CompletionConfig, ConfigFormat, ConfigLoader};
pub use context::{QueryContext, TokenMatch};
pub use merge::{merge, MergeInput, NucleoScorer, RankedCandidate, Scorer};
pub use session::{
    AcceptedCompletion, CompletionList, CompletionSession, Direction, Granularity,
};
pub use scheduler::{classify_change, TriggerDecision};
pub use snippet::{parse_template, SnippetError, SnippetHandoff, TabStop};
pub use source::{
    CompletionSource, RegisteredSource, SourceId, SourceRegistry, SourceReply, SourceResult,
    WordSource,
};
pub use types::{
    AcceptContext, AcceptError, ApplyAction, Candidate, CandidateKind, CompletionStatus,
    ConfigError, SourceError,
};
