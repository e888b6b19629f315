//! Snippet template parsing for the accept handoff.
//!
//! When an accepted candidate carries a template (`ApplyAction::Template`),
//! the engine inserts the rendered text and hands the placeholder markers to
//! the host's snippet collaborator. Tab-stop navigation after insertion is
//! entirely that collaborator's concern; this module only turns `$1` /
//! `${2:placeholder}` syntax into text plus markers.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnippetError {
    #[error("unclosed placeholder starting at byte {at}")]
    UnclosedPlaceholder { at: usize },

    #[error("placeholder at byte {at} has no index")]
    MissingIndex { at: usize },
}

/// A single tab stop inside rendered snippet text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabStop {
    /// Jump order; `0` conventionally marks the final cursor position.
    pub index: u32,
    /// Range the marker covers in the rendered text (the placeholder text
    /// for `${n:placeholder}`, empty for `$n`).
    pub range: Range<usize>,
}

/// Rendered snippet text plus the markers the snippet collaborator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetHandoff {
    pub text: String,
    /// Sorted by jump order: 1, 2, ... with 0 last.
    pub tab_stops: Vec<TabStop>,
}

impl SnippetHandoff {
    /// Shifts every marker by `offset`, turning template-relative ranges
    /// into document offsets.
    pub fn at_offset(mut self, offset: usize) -> Self {
        for stop in &mut self.tab_stops {
            stop.range = stop.range.start + offset..stop.range.end + offset;
        }
        self
    }
}

/// Parse a snippet template.
///
/// Supported syntax: `$1`, `${2}`, `${3:placeholder}`, and `\$` to escape a
/// literal dollar sign. Placeholder text may not nest.
pub fn parse_template(template: &str) -> Result<SnippetHandoff, SnippetError> {
    let mut text = String::with_capacity(template.len());
    let mut tab_stops = Vec::new();
    let mut chars = template.char_indices().peekable();

    while let Some((at, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, next)) = chars.next() {
                    text.push(next);
                } else {
                    text.push('\\');
                }
            }
            '$' => match chars.peek().copied() {
                Some((_, '{')) => {
                    chars.next();
                    let mut index_digits = String::new();
                    while let Some((_, digit)) = chars.peek().copied() {
                        if digit.is_ascii_digit() {
                            index_digits.push(digit);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if index_digits.is_empty() {
                        return Err(SnippetError::MissingIndex { at });
                    }
                    // Index fits u32 for any sane template; fall back to 0
                    // is not acceptable, so reject overflow as missing.
                    let index: u32 = index_digits
                        .parse()
                        .map_err(|_| SnippetError::MissingIndex { at })?;

                    let mut placeholder = String::new();
                    match chars.next() {
                        Some((_, '}')) => {}
                        Some((_, ':')) => loop {
                            match chars.next() {
                                Some((_, '}')) => break,
                                Some((_, inner)) => placeholder.push(inner),
                                None => {
                                    return Err(SnippetError::UnclosedPlaceholder { at });
                                }
                            }
                        },
                        _ => return Err(SnippetError::UnclosedPlaceholder { at }),
                    }

                    let start = text.len();
                    text.push_str(&placeholder);
                    tab_stops.push(TabStop {
                        index,
                        range: start..text.len(),
                    });
                }
                Some((_, digit)) if digit.is_ascii_digit() => {
                    let mut index_digits = String::new();
                    while let Some((_, d)) = chars.peek().copied() {
                        if d.is_ascii_digit() {
                            index_digits.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let index: u32 = index_digits
                        .parse()
                        .map_err(|_| SnippetError::MissingIndex { at })?;
                    tab_stops.push(TabStop {
                        index,
                        range: text.len()..text.len(),
                    });
                }
                _ => text.push('$'),
            },
            _ => text.push(ch),
        }
    }

    // Jump order: 1, 2, ... then 0 (final position). Stable for equal
    // indices so earlier markers come first.
    tab_stops.sort_by_key(|stop| if stop.index == 0 { u32::MAX } else { stop.index });

    Ok(SnippetHandoff { text, tab_stops })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_no_stops() {
        let snippet = parse_template("println").unwrap();
        assert_eq!(snippet.text, "println");
        assert!(snippet.tab_stops.is_empty());
    }

    #[test]
    fn test_bare_stops() {
        let snippet = parse_template("for $1 in $2 {}").unwrap();
        assert_eq!(snippet.text, "for  in  {}");
        assert_eq!(
            snippet.tab_stops,
            vec![
                TabStop { index: 1, range: 4..4 },
                TabStop { index: 2, range: 8..8 },
            ]
        );
    }

    #[test]
    fn test_placeholder_text_is_rendered() {
        let snippet = parse_template("fn ${1:name}(${2:args})").unwrap();
        assert_eq!(snippet.text, "fn name(args)");
        assert_eq!(
            snippet.tab_stops,
            vec![
                TabStop { index: 1, range: 3..7 },
                TabStop { index: 2, range: 8..12 },
            ]
        );
    }

    #[test]
    fn test_final_stop_sorts_last() {
        let snippet = parse_template("${0}before${1:x}").unwrap();
        assert_eq!(snippet.tab_stops.len(), 2);
        assert_eq!(snippet.tab_stops[0].index, 1);
        assert_eq!(snippet.tab_stops[1].index, 0);
    }

    #[test]
    fn test_escaped_dollar() {
        let snippet = parse_template(r"costs \$5").unwrap();
        assert_eq!(snippet.text, "costs $5");
        assert!(snippet.tab_stops.is_empty());
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        let snippet = parse_template("US$ rate").unwrap();
        assert_eq!(snippet.text, "US$ rate");
    }

    #[test]
    fn test_unclosed_placeholder_is_rejected() {
        assert_eq!(
            parse_template("fn ${1:name"),
            Err(SnippetError::UnclosedPlaceholder { at: 3 })
        );
    }

    #[test]
    fn test_missing_index_is_rejected() {
        assert_eq!(
            parse_template("${:oops}"),
            Err(SnippetError::MissingIndex { at: 0 })
        );
    }

    #[test]
    fn test_at_offset_shifts_markers() {
        let snippet = parse_template("${1:ab}").unwrap().at_offset(10);
        assert_eq!(snippet.tab_stops[0].range, 10..12);
    }
}
