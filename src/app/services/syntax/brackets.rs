use crate::app::domain::document::{Overlay, OverlayKind};
use crate::app::domain::text::{TextBuffer, TextPos};

const PAIRS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

enum Direction {
    Forward(char, char),
    Backward(char, char),
}

fn direction(ch: char) -> Option<Direction> {
    PAIRS.iter().find_map(|&(open, close)| {
        if ch == open {
            Some(Direction::Forward(open, close))
        } else if ch == close {
            Some(Direction::Backward(open, close))
        } else {
            None
        }
    })
}

/// Find the bracket pair touching `cursor` and return its overlays.
///
/// The character after the cursor wins over the one before it. A matched
/// pair yields two `BracketMatch` overlays; a bracket without partner yields
/// a single `BracketMismatch`. No bracket next to the cursor yields nothing.
pub fn match_brackets(text: &TextBuffer, cursor: TextPos) -> Vec<Overlay> {
    let cursor = text.clamp(cursor);
    let Some(line) = text.block(cursor.block) else {
        return Vec::new();
    };

    let after = line[cursor.column..].chars().next().map(|c| (cursor.column, c));
    let before = line[..cursor.column].char_indices().next_back();

    for (column, ch) in after.into_iter().chain(before) {
        let Some(dir) = direction(ch) else {
            continue;
        };
        let at = TextPos::new(cursor.block, column);
        let partner = match dir {
            Direction::Forward(open, close) => scan_forward(text, at, open, close),
            Direction::Backward(open, close) => scan_backward(text, at, open, close),
        };
        return match partner {
            Some(other) => vec![
                bracket_overlay(at, ch, OverlayKind::BracketMatch),
                bracket_overlay(other.0, other.1, OverlayKind::BracketMatch),
            ],
            None => vec![bracket_overlay(at, ch, OverlayKind::BracketMismatch)],
        };
    }
    Vec::new()
}

fn bracket_overlay(pos: TextPos, ch: char, kind: OverlayKind) -> Overlay {
    Overlay {
        start: pos,
        end: TextPos::new(pos.block, pos.column + ch.len_utf8()),
        kind,
    }
}

fn scan_forward(text: &TextBuffer, from: TextPos, open: char, close: char) -> Option<(TextPos, char)> {
    let mut depth = 0usize;
    for block in from.block..text.block_count() {
        let line = text.block(block)?;
        let skip = if block == from.block { from.column + open.len_utf8() } else { 0 };
        for (col, ch) in line[skip..].char_indices() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                if depth == 0 {
                    return Some((TextPos::new(block, skip + col), ch));
                }
                depth -= 1;
            }
        }
    }
    None
}

fn scan_backward(text: &TextBuffer, from: TextPos, open: char, close: char) -> Option<(TextPos, char)> {
    let mut depth = 0usize;
    for block in (0..=from.block).rev() {
        let line = text.block(block)?;
        let limit = if block == from.block { from.column } else { line.len() };
        for (col, ch) in line[..limit].char_indices().rev() {
            if ch == close {
                depth += 1;
            } else if ch == open {
                if depth == 0 {
                    return Some((TextPos::new(block, col), ch));
                }
                depth -= 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_match_across_blocks() {
        let text = TextBuffer::from_text("fn x() {\n  (a[1])\n}");
        let overlays = match_brackets(&text, TextPos::new(0, 7));
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].start, TextPos::new(0, 7));
        assert_eq!(overlays[1].start, TextPos::new(2, 0));
        assert!(overlays.iter().all(|o| o.kind == OverlayKind::BracketMatch));
    }

    #[test]
    fn test_backward_match_before_cursor() {
        let text = TextBuffer::from_text("(a[1])");
        // cursor after ']'
        let overlays = match_brackets(&text, TextPos::new(0, 5));
        // ')' after the cursor takes priority
        assert_eq!(overlays[0].start, TextPos::new(0, 5));
        assert_eq!(overlays[1].start, TextPos::new(0, 0));

        let overlays = match_brackets(&text, TextPos::new(0, 6));
        assert_eq!(overlays[1].start, TextPos::new(0, 0));
    }

    #[test]
    fn test_nested_skips_inner_pairs() {
        let text = TextBuffer::from_text("{ { } }");
        let overlays = match_brackets(&text, TextPos::new(0, 0));
        assert_eq!(overlays[1].start, TextPos::new(0, 6));
    }

    #[test]
    fn test_brackets_in_string_literals_count() {
        let text = TextBuffer::from_text("f(\")\")");
        let overlays = match_brackets(&text, TextPos::new(0, 1));
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[1].start, TextPos::new(0, 3));
    }

    #[test]
    fn test_unmatched_bracket() {
        let text = TextBuffer::from_text("(((");
        let overlays = match_brackets(&text, TextPos::new(0, 0));
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].kind, OverlayKind::BracketMismatch);
    }

    #[test]
    fn test_no_bracket_near_cursor() {
        let text = TextBuffer::from_text("plain text");
        assert!(match_brackets(&text, TextPos::new(0, 3)).is_empty());
    }
}
