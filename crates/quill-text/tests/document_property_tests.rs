//! Property-based tests for document snapshots and edits.

use proptest::prelude::*;
use quill_text::{is_word_char, word_prefix, word_start_before, Document, TextEdit};

/// Strategy for ASCII document text, so every offset is a char boundary.
fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_ \n.]{0,40}"
}

proptest! {
    /// Property: applying an edit bumps the version exactly once and leaves
    /// the original snapshot untouched.
    #[test]
    fn prop_apply_is_persistent(
        text in text_strategy(),
        insert in "[a-z]{0,8}",
        at_fraction in 0.0f64..=1.0
    ) {
        let doc = Document::new(text.clone());
        let at = (doc.len() as f64 * at_fraction) as usize;
        let at = at.min(doc.len());

        let next = doc.apply(&TextEdit::insert_at(at, insert.clone())).unwrap();
        prop_assert_eq!(doc.text(), text.as_str());
        prop_assert_eq!(next.version(), doc.version().next());
        prop_assert_eq!(next.len(), doc.len() + insert.len());
    }

    /// Property: the result of an edit is the expected splice.
    #[test]
    fn prop_apply_splices(
        text in text_strategy(),
        insert in "[a-z]{0,8}",
        bounds in (0.0f64..=1.0, 0.0f64..=1.0)
    ) {
        let doc = Document::new(text.clone());
        let a = (doc.len() as f64 * bounds.0) as usize;
        let b = (doc.len() as f64 * bounds.1) as usize;
        let (start, end) = (a.min(b).min(doc.len()), a.max(b).min(doc.len()));

        let next = doc.apply(&TextEdit::new(start..end, insert.clone())).unwrap();
        let expected = format!("{}{}{}", &text[..start], insert, &text[end..]);
        prop_assert_eq!(next.text(), expected.as_str());
    }

    /// Property: the word prefix before any position consists only of word
    /// characters and ends at that position.
    #[test]
    fn prop_word_prefix_is_word_chars(
        text in text_strategy(),
        at_fraction in 0.0f64..=1.0
    ) {
        let pos = ((text.len() as f64) * at_fraction) as usize;
        let pos = pos.min(text.len());

        let start = word_start_before(&text, pos);
        prop_assert!(start <= pos);
        let prefix = word_prefix(&text, pos);
        prop_assert_eq!(prefix.len(), pos - start);
        prop_assert!(prefix.chars().all(is_word_char));

        // Maximality: the character just before the prefix, if any, is not
        // a word character.
        if start > 0 {
            let before = text[..start].chars().next_back().unwrap();
            prop_assert!(!is_word_char(before));
        }
    }

    /// Property: mapping a position through an edit preserves relative
    /// order for positions outside the replaced range.
    #[test]
    fn prop_map_pos_is_monotonic(
        text in text_strategy(),
        insert in "[a-z]{0,8}",
        bounds in (0.0f64..=1.0, 0.0f64..=1.0)
    ) {
        let len = text.len();
        let a = (len as f64 * bounds.0) as usize;
        let b = (len as f64 * bounds.1) as usize;
        let (start, end) = (a.min(b).min(len), a.max(b).min(len));
        let edit = TextEdit::new(start..end, insert);

        let mapped: Vec<usize> = (0..=len)
            .filter_map(|pos| edit.map_pos(pos))
            .collect();
        prop_assert!(mapped.windows(2).all(|w| w[0] <= w[1]));
    }
}
