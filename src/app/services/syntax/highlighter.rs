use syntect::highlighting::{HighlightIterator, HighlightState, Highlighter};
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};

use super::block_state::{LineState, StyleSpan};
use super::style_map::StyleMap;

/// Fresh state for the first block of a document.
pub fn initial_state(syntax: &SyntaxReference, highlighter: &Highlighter) -> LineState {
    LineState {
        parse: ParseState::new(syntax),
        highlight: HighlightState::new(highlighter, ScopeStack::new()),
    }
}

/// Highlight a single block starting from `state`.
/// Returns the block's spans and the state at its end.
pub fn highlight_block(
    block: &str,
    mut state: LineState,
    syntax_set: &SyntaxSet,
    highlighter: &Highlighter,
    style_map: &mut StyleMap,
) -> (Vec<StyleSpan>, LineState) {
    // The newline-aware syntax set expects the line terminator
    let mut line = String::with_capacity(block.len() + 1);
    line.push_str(block);
    line.push('\n');

    let ops = state.parse.parse_line(&line, syntax_set).unwrap_or_default();

    let mut spans: Vec<StyleSpan> = Vec::new();
    {
        let iter = HighlightIterator::new(&mut state.highlight, &ops, &line, highlighter);
        let mut offset = 0;
        for (style, piece) in iter {
            let start = offset;
            offset += piece.len();
            let end = offset.min(block.len());
            if start >= end {
                continue;
            }
            let ch = style_map.get_or_insert(style);
            match spans.last_mut() {
                Some(last) if last.style == ch && last.end == start => last.end = end,
                _ => spans.push(StyleSpan { start, end, style: ch }),
            }
        }
    }

    (spans, state)
}
