//! End-to-end workflow tests: a simulated host editor drives the engine
//! through typing, resolution, selection, and acceptance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_completion::{
    Candidate, CandidateKind, CompletionConfig, CompletionSession, CompletionSource,
    CompletionStatus, ConfigFormat, ConfigLoader, Direction, Granularity, QueryContext,
    SourceError, SourceRegistry, SourceReply, SourceResult,
};
use quill_text::{Document, DocumentChange, TextEdit};

/// A keyword source in the shape a host would actually register.
struct KeywordSource {
    keywords: &'static [&'static str],
}

#[async_trait]
impl CompletionSource for KeywordSource {
    fn name(&self) -> &str {
        "keywords"
    }

    fn is_applicable(&self, cx: &QueryContext) -> bool {
        cx.explicit() || cx.token_before().is_some()
    }

    async fn query(&self, cx: &QueryContext) -> Result<SourceReply, SourceError> {
        let Some(token) = cx.token_before() else {
            return Ok(SourceReply::Empty);
        };
        let candidates: Vec<Candidate> = self
            .keywords
            .iter()
            .map(|kw| Candidate::new(*kw, CandidateKind::Keyword))
            .collect();
        Ok(SourceReply::Complete(
            SourceResult::new(token.from, candidates).valid_while_word(),
        ))
    }
}

/// Host-side editor state: owns the buffer and forwards events.
struct Editor {
    doc: Document,
    cursor: usize,
    session: CompletionSession,
}

impl Editor {
    fn new(text: &str, session: CompletionSession) -> Self {
        let doc = Document::new(text);
        let cursor = doc.len();
        Self {
            doc,
            cursor,
            session,
        }
    }

    fn type_str(&mut self, text: &str) {
        for ch in text.chars() {
            let edit = TextEdit::insert_at(self.cursor, ch.to_string());
            self.doc = self.doc.apply(&edit).unwrap();
            self.cursor += ch.len_utf8();
            self.session
                .apply_change(self.doc.clone(), DocumentChange::new(edit, self.cursor));
        }
    }

    fn accept_selected(&mut self) {
        let accepted = self.session.accept(None).unwrap();
        self.doc = self.doc.apply(&accepted.edit).unwrap();
        self.cursor = accepted.cursor;
    }

    async fn idle(&mut self, duration: Duration) {
        // Let freshly spawned timer tasks register their sleeps before the
        // paused clock moves.
        tokio::task::yield_now().await;
        tokio::time::advance(duration).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
            self.session.pump();
        }
    }
}

fn rust_keywords() -> Arc<KeywordSource> {
    Arc::new(KeywordSource {
        keywords: &["match", "mod", "move", "mut"],
    })
}

#[tokio::test(start_paused = true)]
async fn type_resolve_navigate_accept() {
    let mut registry = SourceRegistry::new();
    registry.register(rust_keywords());
    let session = CompletionSession::new(CompletionConfig::default(), registry).unwrap();
    let mut editor = Editor::new("let x = ", session);

    editor.type_str("mo");
    editor.idle(Duration::from_millis(120)).await;

    assert_eq!(editor.session.status(), CompletionStatus::Active);
    let labels: Vec<_> = editor
        .session
        .candidates()
        .iter()
        .map(|c| c.label().to_string())
        .collect();
    assert_eq!(labels, vec!["mod", "move"]);

    editor.session.move_selection(Direction::Forward, Granularity::Item);
    editor.accept_selected();

    assert_eq!(editor.doc.text(), "let x = move");
    assert_eq!(editor.cursor, 12);
    assert_eq!(editor.session.status(), CompletionStatus::Inactive);
}

#[tokio::test(start_paused = true)]
async fn continued_typing_narrows_before_accept() {
    let mut registry = SourceRegistry::new();
    registry.register(rust_keywords());
    let session = CompletionSession::new(CompletionConfig::default(), registry).unwrap();
    let mut editor = Editor::new("", session);

    editor.type_str("m");
    editor.idle(Duration::from_millis(120)).await;
    assert_eq!(editor.session.candidates().len(), 4);

    // Narrowing happens instantly off the still-valid result; the buffer
    // has advanced two versions past the one it was computed against.
    editor.type_str("ut");
    let labels: Vec<_> = editor
        .session
        .candidates()
        .iter()
        .map(|c| c.label().to_string())
        .collect();
    assert_eq!(labels, vec!["mut"]);

    editor.accept_selected();
    assert_eq!(editor.doc.text(), "mut");
}

#[tokio::test(start_paused = true)]
async fn loaded_config_drives_session_behavior() {
    let config = ConfigLoader::load_from_string(
        "debounce_ms: 40\nmax_candidates: 2\nselect_on_open: true\n",
        ConfigFormat::Yaml,
    )
    .unwrap();

    let mut registry = SourceRegistry::new();
    registry.register(rust_keywords());
    let session = CompletionSession::new(config, registry).unwrap();
    let mut editor = Editor::new("", session);

    editor.type_str("m");
    editor.idle(Duration::from_millis(50)).await;

    // The shorter debounce fired and the list is capped at two entries.
    assert_eq!(editor.session.status(), CompletionStatus::Active);
    assert_eq!(editor.session.candidates().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoning_the_word_dismisses_completion() {
    let mut registry = SourceRegistry::new();
    registry.register(rust_keywords());
    let session = CompletionSession::new(CompletionConfig::default(), registry).unwrap();
    let mut editor = Editor::new("", session);

    editor.type_str("mo");
    editor.idle(Duration::from_millis(120)).await;
    assert_eq!(editor.session.status(), CompletionStatus::Active);

    // A space is not part of any completion region.
    editor.type_str(" ");
    assert_eq!(editor.session.status(), CompletionStatus::Inactive);

    // And the abandoned session left the buffer alone.
    assert_eq!(editor.doc.text(), "mo ");
    assert!(editor.session.accept(None).is_err());
}
