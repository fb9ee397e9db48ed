use std::collections::HashMap;

use syntect::highlighting::{Color as SyntectColor, FontStyle, Style};

/// One entry of the style table handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleEntry {
    pub color: (u8, u8, u8),
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl StyleEntry {
    fn plain() -> Self {
        Self {
            color: (0, 0, 0),
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// Maps syntect styles to compact style characters ('A', 'B', 'C', ...).
/// Dynamically builds the style table as new styles are encountered.
pub struct StyleMap {
    style_to_char: HashMap<StyleEntry, char>,
    entries: Vec<StyleEntry>,
}

impl StyleMap {
    pub fn new() -> Self {
        let mut map = Self {
            style_to_char: HashMap::new(),
            entries: Vec::new(),
        };
        map.insert_default();
        map
    }

    fn insert_default(&mut self) {
        // 'A' is the fallback style (plain text color)
        let plain = StyleEntry::plain();
        self.entries.push(plain);
        self.style_to_char.insert(plain, 'A');
    }

    /// Get the style character for a syntect style, inserting a new entry if needed.
    pub fn get_or_insert(&mut self, style: Style) -> char {
        let key = entry_for(style.foreground, style.font_style);
        if let Some(&ch) = self.style_to_char.get(&key) {
            return ch;
        }

        let idx = self.entries.len();
        // 'A'..'Z' then everything shares the last slot
        if idx >= 26 {
            return (b'A' + 25) as char;
        }
        let ch = (b'A' + idx as u8) as char;
        self.entries.push(key);
        self.style_to_char.insert(key, ch);
        ch
    }

    pub fn entries(&self) -> &[StyleEntry] {
        &self.entries
    }

    /// Look up the entry behind a style character.
    pub fn entry(&self, ch: char) -> Option<&StyleEntry> {
        let idx = (ch as u32).checked_sub('A' as u32)? as usize;
        self.entries.get(idx)
    }

    /// Clear all mappings (used on theme change).
    pub fn clear(&mut self) {
        self.style_to_char.clear();
        self.entries.clear();
        self.insert_default();
    }
}

impl Default for StyleMap {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_for(color: SyntectColor, font_style: FontStyle) -> StyleEntry {
    StyleEntry {
        color: (color.r, color.g, color.b),
        bold: font_style.contains(FontStyle::BOLD),
        italic: font_style.contains(FontStyle::ITALIC),
        underline: font_style.contains(FontStyle::UNDERLINE),
    }
}
