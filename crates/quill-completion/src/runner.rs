//! Drives a single source invocation to completion on its own task.
//!
//! The runner is the only place engine code awaits a source. Every
//! invocation terminates in exactly one reported outcome, tagged with the
//! generation of the query wave that started it; the session drops events
//! whose generation has been superseded, which is what protects it from
//! slow or non-cooperative sources.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::context::QueryContext;
use crate::source::{CompletionSource, SourceId, SourceReply, SourceResult};
use crate::types::SourceError;

/// Terminal outcome of one source invocation.
#[derive(Debug)]
pub(crate) enum RunnerOutcome {
    Complete(SourceResult),
    Empty,
    RetryLater,
    Failed(SourceError),
    Cancelled,
}

/// Reported by a runner task back to the session.
#[derive(Debug)]
pub(crate) struct RunnerEvent {
    pub source: SourceId,
    pub generation: u64,
    pub outcome: RunnerOutcome,
}

/// Invoke `source` with `cx` on a spawned task, reporting the outcome over
/// `tx`.
///
/// Cancellation is cooperative: the select below stops waiting as soon as
/// the context's token fires, and a source that resolves afterwards anyway
/// is reported as cancelled rather than resolved.
pub(crate) fn spawn_query(
    source: Arc<dyn CompletionSource>,
    cx: QueryContext,
    id: SourceId,
    generation: u64,
    tx: UnboundedSender<RunnerEvent>,
) {
    tokio::spawn(async move {
        let cancel = cx.cancel_token().clone();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => RunnerOutcome::Cancelled,
            reply = source.query(&cx) => {
                if cancel.is_cancelled() {
                    RunnerOutcome::Cancelled
                } else {
                    match reply {
                        Ok(SourceReply::Complete(result)) => RunnerOutcome::Complete(result),
                        Ok(SourceReply::Empty) => RunnerOutcome::Empty,
                        Ok(SourceReply::RetryLater) => {
                            debug!(source = source.name(), "source deferred, will retry");
                            RunnerOutcome::RetryLater
                        }
                        Err(err) => {
                            warn!(source = source.name(), error = %err, "completion source failed");
                            RunnerOutcome::Failed(err)
                        }
                    }
                }
            }
        };

        // The session may already be gone; a dead channel just means the
        // outcome has no audience.
        let _ = tx.send(RunnerEvent {
            source: id,
            generation,
            outcome,
        });
    });
}
