//! Viewport-driven incremental syntax highlighting.
//!
//! A `HighlighterEngine` is bound to one document. It keeps a highlighted
//! flag per block and only ever computes spans for blocks inside the range
//! it is asked to cover, so the cost of a pass is proportional to the newly
//! exposed unhighlighted blocks rather than to the document size.

mod block_state;
pub mod brackets;
mod highlighter;
pub mod language;
mod style_map;

use std::rc::Rc;

use syntect::highlighting::{Highlighter, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use tracing::debug;

pub use block_state::StyleSpan;
pub use style_map::StyleEntry;

use block_state::BlockStates;
use highlighter::{highlight_block, initial_state};
use style_map::StyleMap;

use crate::app::domain::document::Overlay;
use crate::app::domain::settings::SyntaxTheme;
use crate::app::domain::text::{BlockEdit, BlockRange, TextBuffer, TextPos};

/// Grammars and themes shared by every engine in the process.
pub struct SyntaxResources {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl SyntaxResources {
    pub fn load_defaults() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Grammar for a language tag, if one is bundled.
    pub fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        let token = language::syntax_token(language)?;
        self.syntax_set.find_syntax_by_token(token)
    }

    pub fn has_theme(&self, theme: SyntaxTheme) -> bool {
        self.theme_set.themes.contains_key(theme.theme_key())
    }
}

/// Parameters for creating an engine.
#[derive(Debug, Clone, Copy)]
pub struct HighlightRequest<'a> {
    pub language: &'a str,
    pub visible: BlockRange,
    pub theme: SyntaxTheme,
    pub size_bytes: u64,
    pub max_size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightStats {
    /// Blocks whose spans were (re)computed since the engine was created.
    pub blocks_rehighlighted: u64,
    pub passes: u64,
}

pub struct HighlighterEngine {
    resources: Rc<SyntaxResources>,
    language: String,
    syntax_name: String,
    theme: SyntaxTheme,
    style_map: StyleMap,
    states: BlockStates,
    limit: BlockRange,
    stats: HighlightStats,
}

impl HighlighterEngine {
    /// Create an engine and highlight the visible range only.
    ///
    /// Returns None (highlighting silently skipped) for an empty or unknown
    /// language, an unavailable theme, or a document above the size ceiling.
    pub fn enable(
        resources: &Rc<SyntaxResources>,
        text: &TextBuffer,
        request: HighlightRequest<'_>,
    ) -> Option<Self> {
        if request.language.is_empty() || request.language == "help" {
            return None;
        }
        if request.size_bytes > request.max_size_bytes {
            debug!(
                size = request.size_bytes,
                max = request.max_size_bytes,
                "document too large, skipping syntax highlighting"
            );
            return None;
        }
        let syntax = resources.find_syntax(request.language)?;
        if !resources.has_theme(request.theme) {
            return None;
        }

        let mut engine = Self {
            resources: Rc::clone(resources),
            language: request.language.to_string(),
            syntax_name: syntax.name.clone(),
            theme: request.theme,
            style_map: StyleMap::new(),
            states: BlockStates::with_len(text.block_count()),
            limit: request.visible,
            stats: HighlightStats::default(),
        };
        debug!(language = %engine.language, syntax = %engine.syntax_name, "highlighter created");
        engine.rehighlight_range(text, request.visible);
        Some(engine)
    }

    /// Compute spans for every unhighlighted block inside `range`.
    /// Blocks outside the range are never touched. Returns the number of
    /// blocks recomputed.
    pub fn rehighlight_range(&mut self, text: &TextBuffer, range: BlockRange) -> usize {
        self.limit = range;
        if self.states.len() != text.block_count() {
            // Content was replaced behind our back; nothing can be trusted.
            self.states = BlockStates::with_len(text.block_count());
        }
        let Some(range) = range.clamp(text.block_count()) else {
            return 0;
        };

        let resources = Rc::clone(&self.resources);
        let Some(syntax) = resources.syntax_set.find_syntax_by_name(&self.syntax_name) else {
            return 0;
        };
        let Some(theme) = resources.theme_set.themes.get(self.theme.theme_key()) else {
            return 0;
        };
        let highlighter = Highlighter::new(theme);

        let mut recomputed = 0;
        for block in range.blocks() {
            if self.states.is_highlighted(block) {
                continue;
            }
            let start = self
                .states
                .start_state(block)
                .cloned()
                .unwrap_or_else(|| initial_state(syntax, &highlighter));
            let (spans, end) = highlight_block(
                text.block(block).unwrap_or(""),
                start,
                &resources.syntax_set,
                &highlighter,
                &mut self.style_map,
            );

            let Some(state) = self.states.get_mut(block) else {
                break;
            };
            let end_changed = state.end_state.as_ref() != Some(&end);
            state.spans = spans;
            state.end_state = Some(end);
            state.highlighted = true;
            if end_changed {
                // The next block starts from a different state now
                self.states.invalidate(block + 1);
            }
            recomputed += 1;
        }

        self.stats.blocks_rehighlighted += recomputed as u64;
        self.stats.passes += 1;
        recomputed
    }

    /// Mirror a text edit: edited blocks and the one after them lose their
    /// highlighted flag and are recomputed by the next pass that covers them.
    pub fn on_edit(&mut self, edit: &BlockEdit) {
        self.states.apply_edit(edit);
    }

    /// Bracket overlays at the cursor. Independent of which blocks are
    /// highlighted.
    pub fn match_brackets(&self, text: &TextBuffer, cursor: TextPos) -> Vec<Overlay> {
        brackets::match_brackets(text, cursor)
    }

    /// Switch the color theme. Every block is recomputed lazily.
    pub fn set_theme(&mut self, theme: SyntaxTheme) {
        if theme == self.theme || !self.resources.has_theme(theme) {
            return;
        }
        self.theme = theme;
        self.style_map.clear();
        self.states = BlockStates::with_len(self.states.len());
    }

    pub fn is_highlighted(&self, block: usize) -> bool {
        self.states.is_highlighted(block)
    }

    /// Spans of a block, only while its highlighted flag is set.
    pub fn spans(&self, block: usize) -> Option<&[StyleSpan]> {
        self.states
            .get(block)
            .filter(|b| b.highlighted)
            .map(|b| b.spans.as_slice())
    }

    pub fn highlighted_count(&self) -> usize {
        self.states.highlighted_count()
    }

    pub fn style_table(&self) -> &[StyleEntry] {
        self.style_map.entries()
    }

    pub fn limit(&self) -> BlockRange {
        self.limit
    }

    pub fn stats(&self) -> HighlightStats {
        self.stats
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn theme(&self) -> SyntaxTheme {
        self.theme
    }
}
