//! Per-query snapshots handed to completion sources.

use regex::Regex;
use tokio_util::sync::CancellationToken;

use quill_text::{word_start_before, Document};

/// A span of document text ending at the query position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Byte offset where the matched text starts.
    pub from: usize,
    pub text: String,
}

/// An immutable description of "what is being completed".
///
/// A fresh context is minted for every query attempt; sources never observe
/// the buffer moving underneath them. The cancellation token is a
/// cooperative signal: once signalled it stays signalled, and a source that
/// ignores it merely wastes work that the session will discard.
#[derive(Debug, Clone)]
pub struct QueryContext {
    doc: Document,
    pos: usize,
    explicit: bool,
    cancel: CancellationToken,
}

impl QueryContext {
    pub(crate) fn new(
        doc: Document,
        pos: usize,
        explicit: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            doc,
            pos,
            explicit,
            cancel,
        }
    }

    /// The buffer snapshot this query runs against.
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Cursor position, as a byte offset into [`Self::doc`].
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// True when the user asked for completions explicitly rather than the
    /// engine triggering off typed text.
    pub fn explicit(&self) -> bool {
        self.explicit
    }

    /// Polls the cancellation signal. Long-running sources should check this
    /// between units of work and bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the query is cancelled; for sources that `select!`
    /// against their own I/O.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The identifier-like token immediately before the query position, if
    /// any. This is the span most sources want to complete.
    pub fn token_before(&self) -> Option<TokenMatch> {
        let text = self.doc.text();
        let from = word_start_before(text, self.pos);
        if from == self.pos {
            return None;
        }
        Some(TokenMatch {
            from,
            text: text[from..self.pos].to_string(),
        })
    }

    /// The longest match of `pattern` that ends exactly at the query
    /// position, searching within the current line.
    pub fn match_before(&self, pattern: &Regex) -> Option<TokenMatch> {
        let text = self.doc.text();
        let pos = self.pos.min(text.len());
        let line_start = text[..pos].rfind('\n').map(|idx| idx + 1).unwrap_or(0);

        let mut best: Option<TokenMatch> = None;
        for m in pattern.find_iter(&text[line_start..pos]) {
            if line_start + m.end() == pos {
                let from = line_start + m.start();
                if best.as_ref().map_or(true, |b| from < b.from) {
                    best = Some(TokenMatch {
                        from,
                        text: m.as_str().to_string(),
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_at(text: &str, pos: usize) -> QueryContext {
        QueryContext::new(Document::new(text), pos, false, CancellationToken::new())
    }

    #[test]
    fn test_token_before_extracts_word() {
        let cx = context_at("let foo = ba", 12);
        let token = cx.token_before().unwrap();
        assert_eq!(token.from, 10);
        assert_eq!(token.text, "ba");
    }

    #[test]
    fn test_token_before_empty_at_whitespace() {
        let cx = context_at("let foo = ", 10);
        assert!(cx.token_before().is_none());
    }

    #[test]
    fn test_match_before_anchors_at_pos() {
        let cx = context_at("obj.meth", 8);
        let pattern = Regex::new(r"\w+\.\w*").unwrap();
        let m = cx.match_before(&pattern).unwrap();
        assert_eq!(m.from, 0);
        assert_eq!(m.text, "obj.meth");
    }

    #[test]
    fn test_match_before_misses_non_suffix() {
        let cx = context_at("obj.meth ", 9);
        let pattern = Regex::new(r"\w+\.\w*").unwrap();
        assert!(cx.match_before(&pattern).is_none());
    }

    #[test]
    fn test_match_before_stays_on_line() {
        let cx = context_at("first\nse", 8);
        let pattern = Regex::new(r"\w+").unwrap();
        let m = cx.match_before(&pattern).unwrap();
        assert_eq!(m.from, 6);
        assert_eq!(m.text, "se");
    }

    #[test]
    fn test_cancellation_is_latched() {
        let token = CancellationToken::new();
        let cx = QueryContext::new(Document::new(""), 0, false, token.clone());
        assert!(!cx.is_cancelled());
        token.cancel();
        assert!(cx.is_cancelled());
        // There is no way to un-signal a token; poll again to be sure.
        assert!(cx.is_cancelled());
    }
}
