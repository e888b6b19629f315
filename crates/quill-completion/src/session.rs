//! The completion session state machine.
//!
//! All state transitions happen on the host's event loop thread: the host
//! forwards buffer/selection events and user commands, and calls [`pump`]
//! from its update cycle to apply outcomes reported by runner tasks.
//! Asynchrony lives only in those tasks; the session itself never blocks.
//!
//! Consistency rests on two mechanisms. Every query wave carries a
//! generation, and an outcome whose generation has been superseded is
//! discarded, so a slow old query can never clobber a newer one. And the
//! public candidate list is rebuilt from scratch on every transition,
//! including only resolved results whose validity span still covers the
//! cursor, so a stale result is unobservable even before its runner is
//! cancelled.
//!
//! [`pump`]: CompletionSession::pump

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quill_text::{is_word_char, word_start_before, Document, DocumentChange, DocumentVersion, TextEdit};

use crate::config::CompletionConfig;
use crate::context::QueryContext;
use crate::merge::{merge, MergeInput, NucleoScorer, RankedCandidate, Scorer};
use crate::runner::{spawn_query, RunnerEvent, RunnerOutcome};
use crate::scheduler::{classify_change, DebounceElapsed, Debouncer, TriggerDecision};
use crate::snippet::{parse_template, SnippetHandoff};
use crate::source::{SourceRegistry, SourceResult};
use crate::types::{
    AcceptContext, AcceptError, ApplyAction, Candidate, CompletionStatus, ConfigError,
};

/// Direction of a selection move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// How far a selection move steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One entry, wrapping at the ends.
    Item,
    /// A configured page of entries, clamping at the ends.
    Page,
}

/// What the host applies after a successful accept.
#[derive(Debug)]
pub struct AcceptedCompletion {
    /// The single buffer edit; replaces the completed span.
    pub edit: TextEdit,
    /// Cursor position after the edit.
    pub cursor: usize,
    /// Present when the candidate carried a template; tab stops are
    /// document-absolute and belong to the snippet collaborator.
    pub snippet: Option<SnippetHandoff>,
    /// The accepted candidate, for host-side bookkeeping.
    pub candidate: Candidate,
}

/// The public, immutable view of the merged candidate list.
///
/// Replaced wholesale on every transition; hosts can cheaply detect change
/// by comparing `Arc` identities across calls.
#[derive(Debug, Clone)]
pub struct CompletionList {
    candidates: Vec<RankedCandidate>,
    selected: Option<usize>,
    doc_version: DocumentVersion,
}

impl CompletionList {
    fn empty(doc_version: DocumentVersion) -> Self {
        Self {
            candidates: Vec::new(),
            selected: None,
            doc_version,
        }
    }

    pub fn candidates(&self) -> &[RankedCandidate] {
        &self.candidates
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_candidate(&self) -> Option<&RankedCandidate> {
        self.selected.and_then(|idx| self.candidates.get(idx))
    }

    /// Buffer version this list was computed against.
    pub fn doc_version(&self) -> DocumentVersion {
        self.doc_version
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A query still in flight (or deferred) for one source.
struct PendingQuery {
    generation: u64,
    cancel: CancellationToken,
    doc_version: DocumentVersion,
    /// The last invocation returned `RetryLater`: no task is running, and
    /// the next qualifying change re-invokes instead of cancelling.
    retry: bool,
}

/// A resolved result pinned to the context it was computed in.
struct ResolvedEntry {
    doc_version: DocumentVersion,
    result: SourceResult,
}

impl ResolvedEntry {
    fn is_valid_at(&self, doc: &Document, cursor: usize) -> bool {
        let same_version = self.doc_version == doc.version();
        self.result.is_valid_at(doc, cursor, same_version)
    }
}

/// Lifecycle of one source within the session. Owned exclusively here;
/// runner outcomes are reported through [`RunnerEvent`], never self-applied.
enum SlotState {
    Idle,
    Pending(PendingQuery),
    Resolved(Arc<ResolvedEntry>),
    Failed,
}

/// An autocompletion session over one buffer.
///
/// The host owns the buffer; the session only ever reads snapshots of it
/// and returns at most one [`TextEdit`] from [`accept`].
///
/// [`accept`]: CompletionSession::accept
pub struct CompletionSession {
    config: CompletionConfig,
    registry: SourceRegistry,
    scorer: Arc<dyn Scorer>,

    doc: Document,
    cursor: usize,
    /// Start of the triggering region while a session is open. Deleting
    /// back past this point, or moving outside the word that follows it,
    /// closes the session.
    anchor: usize,
    open: bool,

    /// Query-wave counter; outcomes tagged with an older wave are stale.
    generation: u64,
    slots: Vec<SlotState>,
    list: Arc<CompletionList>,

    runner_tx: UnboundedSender<RunnerEvent>,
    runner_rx: UnboundedReceiver<RunnerEvent>,
    debounce_tx: UnboundedSender<DebounceElapsed>,
    debounce_rx: UnboundedReceiver<DebounceElapsed>,
    debouncer: Debouncer,
}

impl CompletionSession {
    pub fn new(config: CompletionConfig, registry: SourceRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let (runner_tx, runner_rx) = mpsc::unbounded_channel();
        let (debounce_tx, debounce_rx) = mpsc::unbounded_channel();
        let slots = (0..registry.len()).map(|_| SlotState::Idle).collect();

        Ok(Self {
            config,
            registry,
            scorer: Arc::new(NucleoScorer),
            doc: Document::new(""),
            cursor: 0,
            anchor: 0,
            open: false,
            generation: 0,
            slots,
            list: Arc::new(CompletionList::empty(DocumentVersion::INITIAL)),
            runner_tx,
            runner_rx,
            debounce_tx,
            debounce_rx,
            debouncer: Debouncer::new(),
        })
    }

    /// Replace the match-quality scoring strategy.
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    // ---- host-facing queries -------------------------------------------

    pub fn status(&self) -> CompletionStatus {
        if !self.open {
            CompletionStatus::Inactive
        } else if self
            .slots
            .iter()
            .any(|slot| matches!(slot, SlotState::Pending(_)))
        {
            CompletionStatus::Pending
        } else if !self.list.is_empty() {
            CompletionStatus::Active
        } else {
            CompletionStatus::Inactive
        }
    }

    /// The current merged candidate list. The returned `Arc` is replaced,
    /// never mutated, on each transition.
    pub fn list(&self) -> Arc<CompletionList> {
        Arc::clone(&self.list)
    }

    pub fn candidates(&self) -> &[RankedCandidate] {
        self.list.candidates()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.list.selected()
    }

    pub fn doc_version(&self) -> DocumentVersion {
        self.doc.version()
    }

    // ---- host-facing commands ------------------------------------------

    /// Explicit "show completions now": bypasses the debounce, supersedes
    /// any pending timer, and restarts every source.
    pub fn start_completion(&mut self, doc: Document, cursor: usize) {
        self.doc = doc;
        self.cursor = cursor;
        self.debouncer.cancel_pending();

        self.anchor = word_start_before(self.doc.text(), self.cursor);
        if !self.open {
            debug!(cursor = self.cursor, "completion session opened (explicit)");
            self.open = true;
        }
        self.query_wave(true, true);
        self.recompute();
    }

    /// Report an applied buffer edit along with the snapshot it produced.
    pub fn apply_change(&mut self, doc: Document, change: DocumentChange) {
        let decision = classify_change(&self.config, self.open, &change);
        let was_open = self.open;

        if self.open {
            match change.edit.map_pos(self.anchor) {
                Some(anchor) => self.anchor = anchor,
                None => {
                    // The edit swallowed the trigger point.
                    self.close();
                }
            }
        }

        self.doc = doc;
        self.cursor = change.cursor;

        if let Some(ch) = change.typed_char() {
            if self.open && self.config.is_trigger_char(ch) {
                // A trigger character starts a fresh region at the cursor.
                self.anchor = self.cursor;
            }
        }

        match decision {
            TriggerDecision::Close => self.close(),
            TriggerDecision::None => {}
            TriggerDecision::Implicit => {
                if self.open && !self.region_intact() {
                    // Deleted or moved out of the triggering region: this
                    // edit closes the session rather than re-triggering it.
                    self.close();
                } else if !(was_open && !self.open) {
                    self.debouncer
                        .schedule(self.config.debounce(), self.debounce_tx.clone());
                }
            }
        }

        if self.open {
            self.recompute();
        }
    }

    /// Report a cursor move that did not change the buffer.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
        if !self.open {
            return;
        }
        if self.region_intact() {
            self.recompute();
        } else {
            self.close();
        }
    }

    /// Move the highlighted candidate.
    pub fn move_selection(&mut self, direction: Direction, granularity: Granularity) {
        let len = self.list.len();
        if !self.open || len == 0 {
            return;
        }

        let selected = match (self.list.selected(), direction) {
            (None, Direction::Forward) => 0,
            (None, Direction::Backward) => len - 1,
            (Some(current), _) => match granularity {
                Granularity::Item => match direction {
                    Direction::Forward => (current + 1) % len,
                    Direction::Backward => (current + len - 1) % len,
                },
                Granularity::Page => match direction {
                    Direction::Forward => (current + self.config.page_size).min(len - 1),
                    Direction::Backward => current.saturating_sub(self.config.page_size),
                },
            },
        };

        self.list = Arc::new(CompletionList {
            candidates: self.list.candidates.clone(),
            selected: Some(selected),
            doc_version: self.list.doc_version,
        });
    }

    /// Accept a candidate, by explicit index or the current selection.
    ///
    /// Validation failures are no-ops by contract: the buffer and cursor
    /// are untouched and the error only says why nothing happened.
    pub fn accept(&mut self, index: Option<usize>) -> Result<AcceptedCompletion, AcceptError> {
        if !self.open {
            return Err(AcceptError::Closed);
        }
        let list = Arc::clone(&self.list);
        let index = index.or(list.selected()).ok_or(AcceptError::NoSelection)?;
        let ranked = list
            .candidates()
            .get(index)
            .ok_or(AcceptError::OutOfRange {
                index,
                len: list.len(),
            })?;

        // Invariant: a candidate computed against an older buffer version
        // must have revalidated (validity span, or an apply-action that
        // computes against the live document).
        let revalidated = match &self.slots[ranked.source.index()] {
            SlotState::Resolved(entry) => entry.is_valid_at(&self.doc, self.cursor),
            _ => false,
        };
        let self_validating = matches!(ranked.candidate.apply, ApplyAction::Edit(_));
        if !revalidated && !self_validating {
            return Err(AcceptError::Stale {
                computed: ranked.doc_version,
                current: self.doc.version(),
            });
        }

        let from = ranked.from;
        let cursor = self.cursor;
        let candidate = ranked.candidate.clone();

        let (edit, snippet) = match &candidate.apply {
            ApplyAction::Insert(text) => (TextEdit::new(from..cursor, text.clone()), None),
            ApplyAction::Template(template) => match parse_template(template) {
                Ok(handoff) => {
                    let edit = TextEdit::new(from..cursor, handoff.text.clone());
                    (edit, Some(handoff.at_offset(from)))
                }
                Err(err) => {
                    warn!(label = %candidate.label, error = %err, "malformed snippet template, inserting literally");
                    (TextEdit::new(from..cursor, template.clone()), None)
                }
            },
            ApplyAction::Edit(apply) => {
                let cx = AcceptContext {
                    doc: &self.doc,
                    from,
                    cursor,
                    candidate: &candidate,
                };
                ((**apply)(&cx), None)
            }
        };

        let cursor_after = match snippet.as_ref().and_then(|s| s.tab_stops.first()) {
            Some(stop) => stop.range.start,
            None => edit.range.start + edit.insert.len(),
        };

        debug!(label = %candidate.label, "completion accepted");
        self.close();

        Ok(AcceptedCompletion {
            edit,
            cursor: cursor_after,
            snippet,
            candidate,
        })
    }

    /// Dismiss the session and cancel all in-flight work. Idempotent.
    pub fn close(&mut self) {
        self.debouncer.cancel_pending();
        for slot in &mut self.slots {
            if let SlotState::Pending(pending) = slot {
                pending.cancel.cancel();
            }
            *slot = SlotState::Idle;
        }
        // Supersede anything still in flight.
        self.generation = self.generation.wrapping_add(1);
        if self.open {
            debug!("completion session closed");
        }
        self.open = false;
        self.list = Arc::new(CompletionList::empty(self.doc.version()));
    }

    /// The editor lost focus.
    pub fn on_blur(&mut self) {
        if self.config.close_on_blur {
            self.close();
        }
    }

    /// Apply all queued runner outcomes and timer fires, in the order they
    /// completed. Returns how many events were handled. Hosts call this
    /// from their update cycle.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(fired) = self.debounce_rx.try_recv() {
                self.on_debounce(fired);
                handled += 1;
                continue;
            }
            match self.runner_rx.try_recv() {
                Ok(event) => {
                    self.on_runner_event(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    // ---- internal transitions ------------------------------------------

    fn on_debounce(&mut self, fired: DebounceElapsed) {
        if !self.debouncer.is_current(fired.generation) {
            debug!("discarding superseded debounce fire");
            return;
        }
        if self.registry.is_empty() {
            return;
        }
        if !self.open {
            self.anchor = word_start_before(self.doc.text(), self.cursor);
            self.open = true;
            debug!(cursor = self.cursor, "completion session opened (implicit)");
        }
        self.query_wave(false, false);
        self.recompute();
    }

    fn on_runner_event(&mut self, event: RunnerEvent) {
        let slot = &mut self.slots[event.source.index()];
        let doc_version = match slot {
            SlotState::Pending(pending) if pending.generation == event.generation => {
                pending.doc_version
            }
            _ => {
                debug!(source = %event.source, "discarding stale source outcome");
                return;
            }
        };

        match event.outcome {
            RunnerOutcome::Complete(result) => {
                *slot = SlotState::Resolved(Arc::new(ResolvedEntry {
                    doc_version,
                    result,
                }));
            }
            RunnerOutcome::Empty | RunnerOutcome::Cancelled => *slot = SlotState::Idle,
            RunnerOutcome::RetryLater => {
                if let SlotState::Pending(pending) = slot {
                    pending.retry = true;
                }
            }
            RunnerOutcome::Failed(_) => *slot = SlotState::Failed,
        }

        self.recompute();
    }

    /// Start a new query wave. Pending queries are superseded, idle and
    /// failed sources re-queried; still-valid resolved results are kept
    /// unless `restart_valid` forces a full restart.
    fn query_wave(&mut self, explicit: bool, restart_valid: bool) {
        self.generation = self.generation.wrapping_add(1);
        let wave = self.generation;

        for (id, registered) in self.registry.iter() {
            let slot = &mut self.slots[id.index()];

            let reinvoke = match slot {
                SlotState::Idle | SlotState::Failed => true,
                SlotState::Pending(_) => true,
                SlotState::Resolved(entry) => {
                    restart_valid || !entry.is_valid_at(&self.doc, self.cursor)
                }
            };
            if !reinvoke {
                continue;
            }

            if let SlotState::Pending(pending) = slot {
                if !pending.retry {
                    // One in-flight invocation per source, ever.
                    pending.cancel.cancel();
                }
            }

            let cancel = CancellationToken::new();
            let cx = QueryContext::new(self.doc.clone(), self.cursor, explicit, cancel.clone());
            if !registered.source.is_applicable(&cx) {
                *slot = SlotState::Idle;
                continue;
            }

            spawn_query(
                Arc::clone(&registered.source),
                cx,
                id,
                wave,
                self.runner_tx.clone(),
            );
            *slot = SlotState::Pending(PendingQuery {
                generation: wave,
                cancel,
                doc_version: self.doc.version(),
                retry: false,
            });
        }
    }

    /// Rebuild the public list from the slots that are resolved and still
    /// valid for the current buffer state.
    fn recompute(&mut self) {
        if !self.open {
            return;
        }

        let mut inputs: Vec<MergeInput<'_>> = Vec::new();
        for (id, registered) in self.registry.iter() {
            if let SlotState::Resolved(entry) = &self.slots[id.index()] {
                if entry.is_valid_at(&self.doc, self.cursor) {
                    inputs.push(MergeInput {
                        source: id,
                        priority: registered.priority(),
                        result: &entry.result,
                        doc_version: entry.doc_version,
                    });
                }
            }
        }

        let keep_label = self
            .list
            .selected_candidate()
            .map(|ranked| ranked.label().to_string());
        let candidates = merge(
            &inputs,
            &self.doc,
            self.cursor,
            self.scorer.as_ref(),
            self.config.max_candidates,
            keep_label.as_deref(),
        );

        let any_pending = self
            .slots
            .iter()
            .any(|slot| matches!(slot, SlotState::Pending(_)));

        if candidates.is_empty() && !any_pending {
            // Nothing to show and nothing on the way. The session winds
            // down, but a scheduled debounce re-trigger stays alive so a
            // qualifying edit can reopen it.
            self.open = false;
            self.list = Arc::new(CompletionList::empty(self.doc.version()));
            return;
        }

        let selected = keep_label
            .as_deref()
            .and_then(|label| {
                candidates
                    .iter()
                    .position(|candidate| candidate.label() == label)
            })
            .or_else(|| {
                if self.config.select_on_open && !candidates.is_empty() {
                    Some(0)
                } else {
                    None
                }
            });

        self.list = Arc::new(CompletionList {
            candidates,
            selected,
            doc_version: self.doc.version(),
        });
    }

    fn region_intact(&self) -> bool {
        self.cursor >= self.anchor
            && self
                .doc
                .slice(self.anchor..self.cursor)
                .is_some_and(|span| span.chars().all(is_word_char))
    }
}
