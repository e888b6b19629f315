//! Combining per-source result lists into one ranked, deduplicated list.
//!
//! The ordering rules here are the contract; the numeric match score behind
//! them is a replaceable strategy ([`Scorer`]). Candidates are ordered by
//! effective priority (source priority plus candidate boost), then match
//! quality, then label, and duplicate labels collapse to the
//! highest-priority occurrence.

use std::cmp::Ordering;

use quill_text::{Document, DocumentVersion};

use crate::source::{SourceId, SourceResult};
use crate::types::Candidate;

/// Match-quality scoring strategy.
///
/// `None` means the candidate does not match the pattern at all and is
/// filtered out. Higher scores rank earlier. An empty pattern matches
/// everything with score 0.
pub trait Scorer: Send + Sync {
    fn score(&self, haystack: &str, pattern: &str) -> Option<u32>;
}

/// Default scorer: case-insensitive fuzzy subsequence matching via nucleo.
#[derive(Debug, Default)]
pub struct NucleoScorer;

impl Scorer for NucleoScorer {
    fn score(&self, haystack: &str, pattern: &str) -> Option<u32> {
        use nucleo::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
        use nucleo::{Config, Matcher, Utf32Str};

        if pattern.is_empty() {
            return Some(0);
        }

        let mut matcher = Matcher::new(Config::DEFAULT);
        let pattern = Pattern::new(
            pattern,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );

        let mut buf = Vec::new();
        let haystack = Utf32Str::new(haystack, &mut buf);
        let score = pattern.score(haystack, &mut matcher)?;
        Some(score as u32)
    }
}

/// One resolved source result offered to the merge.
pub struct MergeInput<'a> {
    pub source: SourceId,
    pub priority: i32,
    pub result: &'a SourceResult,
    /// Buffer version the result was computed against.
    pub doc_version: DocumentVersion,
}

/// A candidate in the merged list, annotated with enough provenance to
/// validate and apply it later.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub source: SourceId,
    /// Start of the span this candidate replaces on accept.
    pub from: usize,
    pub score: u32,
    pub(crate) doc_version: DocumentVersion,
}

impl RankedCandidate {
    pub fn label(&self) -> &str {
        &self.candidate.label
    }
}

fn effective_priority(priority: i32, candidate: &Candidate) -> i32 {
    priority + candidate.boost as i32
}

fn rank_order(a: &RankedCandidate, b: &RankedCandidate, pa: i32, pb: i32) -> Ordering {
    pb.cmp(&pa)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.candidate.label.cmp(&b.candidate.label))
        .then_with(|| a.source.index().cmp(&b.source.index()))
}

/// Merge resolved per-source results into the public candidate list.
///
/// Each result is filtered against its own typed prefix (`from..cursor`),
/// ranked, deduplicated by label, and truncated to `max` entries.
/// `keep_label` names the currently selected candidate: if it survives
/// filtering it is never dropped by truncation.
pub fn merge(
    inputs: &[MergeInput<'_>],
    doc: &Document,
    cursor: usize,
    scorer: &dyn Scorer,
    max: usize,
    keep_label: Option<&str>,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<(i32, RankedCandidate)> = Vec::new();

    for input in inputs {
        let Some(prefix) = doc.slice(input.result.from..cursor) else {
            continue;
        };
        for candidate in &input.result.candidates {
            let Some(score) = scorer.score(candidate.filter_key(), prefix) else {
                continue;
            };
            let priority = effective_priority(input.priority, candidate);
            ranked.push((
                priority,
                RankedCandidate {
                    candidate: candidate.clone(),
                    source: input.source,
                    from: input.result.from,
                    score,
                    doc_version: input.doc_version,
                },
            ));
        }
    }

    ranked.sort_by(|(pa, a), (pb, b)| rank_order(a, b, *pa, *pb));

    // Duplicate labels collapse to their first (highest ranked) occurrence.
    let mut merged: Vec<RankedCandidate> = Vec::with_capacity(ranked.len().min(max));
    let mut kept_beyond_cut: Option<RankedCandidate> = None;
    for (_, candidate) in ranked {
        if merged
            .iter()
            .any(|existing| existing.candidate.label == candidate.candidate.label)
            || kept_beyond_cut
                .as_ref()
                .is_some_and(|kept| kept.candidate.label == candidate.candidate.label)
        {
            continue;
        }
        if merged.len() < max {
            merged.push(candidate);
        } else if keep_label.is_some_and(|label| label == candidate.candidate.label) {
            kept_beyond_cut = Some(candidate);
            break;
        }
    }

    // Selection persistence beats strict list-size enforcement for the one
    // selected candidate.
    if let Some(kept) = kept_beyond_cut {
        merged.pop();
        merged.push(kept);
    }

    merged
}
