use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::app::domain::document::{DocumentRecord, Overlay, OverlayKind};
use crate::app::domain::text::{BlockRange, TextBuffer, TextPos};

pub const UNTITLED: &str = "Untitled";
pub const APP_NAME: &str = "MultiPad";

/// Extract filename from a file path
///
/// Returns the filename component of a path, or "Unknown" if it can't be extracted.
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s|\n|\r)+").expect("valid word separator regex"));

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    WORD_SEPARATOR
        .split(text)
        .filter(|w| !w.is_empty())
        .count()
}

/// Label shown on the tab: file name or "Untitled", starred when modified.
pub fn tab_text(doc: &DocumentRecord) -> String {
    let name = doc
        .path()
        .map(extract_filename)
        .unwrap_or_else(|| UNTITLED.to_string());
    decorate(&name, doc.is_modified())
}

/// Window title for the active document; the application name when the
/// window has no tabs.
pub fn window_title(doc: Option<&DocumentRecord>) -> String {
    match doc {
        Some(doc) => tab_text(doc),
        None => APP_NAME.to_string(),
    }
}

fn decorate(name: &str, modified: bool) -> String {
    let flat = name.replace('\n', " ");
    if modified { format!("*{}", flat) } else { flat }
}

/// Byte ranges of `needle` inside `line`, non-overlapping, left to right.
/// Matching ignores ASCII case unless `case_sensitive`.
pub fn find_in_block(line: &str, needle: &str, case_sensitive: bool) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let (hay, pat) = if case_sensitive {
        (line.to_string(), needle.to_string())
    } else {
        (line.to_ascii_lowercase(), needle.to_ascii_lowercase())
    };
    hay.match_indices(&pat)
        .map(|(start, m)| (start, start + m.len()))
        .collect()
}

/// Search-match overlays for every block of `range`. Matches never span
/// blocks.
pub fn search_overlays(text: &TextBuffer, needle: &str, range: BlockRange) -> Vec<Overlay> {
    let Some(range) = range.clamp(text.block_count()) else {
        return Vec::new();
    };
    let mut overlays = Vec::new();
    for block in range.blocks() {
        let Some(line) = text.block(block) else { continue };
        for (start, end) in find_in_block(line, needle, false) {
            overlays.push(Overlay {
                start: TextPos::new(block, start),
                end: TextPos::new(block, end),
                kind: OverlayKind::SearchMatch,
            });
        }
    }
    overlays
}

/// Current-line marker for the cursor block.
pub fn current_line_overlay(text: &TextBuffer, cursor: TextPos) -> Overlay {
    let cursor = text.clamp(cursor);
    let len = text.block(cursor.block).map_or(0, str::len);
    Overlay {
        start: TextPos::new(cursor.block, 0),
        end: TextPos::new(cursor.block, len),
        kind: OverlayKind::CurrentLine,
    }
}
