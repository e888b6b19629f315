//! Trigger classification and the debounce timer.
//!
//! The scheduler never talks to sources itself. It classifies host events
//! into trigger decisions and, for implicit triggers, delays the actual
//! query behind a cancellable timer so a burst of keystrokes costs one
//! query wave instead of one per character.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use quill_text::{is_word_char, DocumentChange};

use crate::config::CompletionConfig;

/// What a buffer change means for the completion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Ignore the event.
    None,
    /// Qualifying edit: (re)start the debounce timer and query when it
    /// elapses.
    Implicit,
    /// Non-qualifying edit while a session is open: close the session.
    Close,
}

/// Classify a host edit.
///
/// An edit qualifies for implicit triggering when it types a single
/// identifier character or a configured trigger character at the cursor.
/// While a session is open, deletions re-qualify (the surviving prefix is
/// re-filtered and invalidated sources re-queried); anything else closes.
pub fn classify_change(
    config: &CompletionConfig,
    session_open: bool,
    change: &DocumentChange,
) -> TriggerDecision {
    if let Some(ch) = change.typed_char() {
        if is_word_char(ch) || config.is_trigger_char(ch) {
            if session_open || config.activate_on_typing {
                return TriggerDecision::Implicit;
            }
            return TriggerDecision::None;
        }
        return if session_open {
            TriggerDecision::Close
        } else {
            TriggerDecision::None
        };
    }

    if change.is_deletion() {
        return if session_open {
            TriggerDecision::Implicit
        } else {
            TriggerDecision::None
        };
    }

    // Pastes and multi-character replacements never auto-trigger.
    if session_open {
        TriggerDecision::Close
    } else {
        TriggerDecision::None
    }
}

/// Event posted when a debounce timer elapses un-cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DebounceElapsed {
    pub generation: u64,
}

/// One-shot, restartable delay timer.
///
/// Each `schedule` supersedes the previous timer: the old task is cancelled
/// and the generation is bumped, so a fire event from a superseded timer is
/// recognizably stale and dropped by the session.
pub(crate) struct Debouncer {
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            generation: 0,
            cancel: None,
        }
    }

    /// Starts (or restarts) the timer. Returns the generation the fire
    /// event will carry.
    pub fn schedule(&mut self, delay: Duration, tx: UnboundedSender<DebounceElapsed>) -> u64 {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        if delay.is_zero() {
            // Nothing to coalesce; fire synchronously through the channel so
            // ordering with runner events is preserved.
            let _ = tx.send(DebounceElapsed { generation });
            return generation;
        }

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(DebounceElapsed { generation });
                }
            }
        });
        generation
    }

    /// Cancels any pending timer without scheduling a new one. A later fire
    /// event from the cancelled task (already in flight) is still stale by
    /// generation.
    pub fn cancel_pending(&mut self) {
        if let Some(token) = self.cancel.take() {
            debug!("debounce timer superseded");
            token.cancel();
        }
    }

    /// Whether `generation` identifies the most recently scheduled timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
