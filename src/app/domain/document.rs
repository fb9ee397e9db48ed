//! Per-tab document state.
//!
//! A `DocumentRecord` owns its text, its highlighter and its running script.
//! The window that displays it is only referenced by id through `Bindings`;
//! moving a tab between windows re-points the bindings and never recreates
//! the record.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::app::domain::text::{BlockEdit, BlockRange, TextBuffer, TextPos};
use crate::app::services::process::ScriptProcess;
use crate::app::services::syntax::HighlighterEngine;

pub const DEFAULT_ENCODING: &str = "UTF-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out document ids that stay unique across every window, so a
/// record keeps its id when it moves.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next_document(&self) -> DocumentId {
        DocumentId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_window(&self) -> WindowId {
        WindowId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Notifications a document relays to the window it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    StatusBar,
    ActionState,
    UndoRedo,
    Modification,
    SearchHighlight,
    WordCount,
    BracketMatch,
    ViewportFormat,
}

impl Signal {
    /// Signals every displayed document carries regardless of window toggles.
    pub const CORE: [Signal; 4] = [
        Signal::ActionState,
        Signal::UndoRedo,
        Signal::Modification,
        Signal::SearchHighlight,
    ];

    /// Signals that only exist while the document has a highlighter.
    pub const HIGHLIGHT: [Signal; 2] = [Signal::BracketMatch, Signal::ViewportFormat];
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    owner: Option<WindowId>,
    signals: BTreeSet<Signal>,
}

impl Bindings {
    pub fn owner(&self) -> Option<WindowId> {
        self.owner
    }

    pub fn signals(&self) -> &BTreeSet<Signal> {
        &self.signals
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.signals.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    SearchMatch,
    BracketMatch,
    BracketMismatch,
    CurrentLine,
}

/// A highlighted range that is not part of the text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub start: TextPos,
    pub end: TextPos,
    pub kind: OverlayKind,
}

/// The overlay sets are independent: clearing one never touches another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraSelections {
    pub search: Vec<Overlay>,
    pub brackets: Vec<Overlay>,
    pub current_line: Vec<Overlay>,
}

impl ExtraSelections {
    /// Display order: current line below search matches below brackets.
    pub fn combined(&self) -> Vec<Overlay> {
        self.current_line
            .iter()
            .chain(&self.search)
            .chain(&self.brackets)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.search.clear();
        self.brackets.clear();
        self.current_line.clear();
    }
}

/// Editor display options applied to the tab from its window's toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub line_numbers: bool,
    pub word_wrap: bool,
    pub auto_indent: bool,
}

pub struct DocumentRecord {
    pub id: DocumentId,
    pub text: TextBuffer,
    pub file_path: Option<PathBuf>,
    pub encoding: String,
    pub program_language: Option<&'static str>,
    /// None until explicitly recomputed; reset by every text change.
    pub word_count: Option<usize>,
    pub file_size_bytes: u64,
    pub highlighter: Option<HighlighterEngine>,
    pub selections: ExtraSelections,
    pub cursor: TextPos,
    pub viewport: BlockRange,
    pub read_only: bool,
    pub search_text: String,
    pub display: DisplayState,
    pub process: Option<ScriptProcess>,
    pub process_log: String,
    bindings: Bindings,
    clean_state: Option<u64>,
}

impl fmt::Debug for DocumentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentRecord")
            .field("id", &self.id)
            .field("file_path", &self.file_path)
            .field("encoding", &self.encoding)
            .field("modified", &self.is_modified())
            .field("language", &self.program_language)
            .field("highlighted", &self.highlighter.is_some())
            .field("owner", &self.bindings.owner)
            .finish()
    }
}

impl DocumentRecord {
    pub fn new(id: DocumentId) -> Self {
        let text = TextBuffer::new();
        let clean_state = Some(text.state_id());
        Self {
            id,
            text,
            file_path: None,
            encoding: DEFAULT_ENCODING.to_string(),
            program_language: None,
            word_count: None,
            file_size_bytes: 0,
            highlighter: None,
            selections: ExtraSelections::default(),
            cursor: TextPos::default(),
            viewport: BlockRange::single(0),
            read_only: false,
            search_text: String::new(),
            display: DisplayState::default(),
            process: None,
            process_log: String::new(),
            bindings: Bindings::default(),
            clean_state,
        }
    }

    pub fn is_untitled(&self) -> bool {
        self.file_path.is_none()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Modified means the text differs from the last saved or loaded state;
    /// undoing back to that state clears it again.
    pub fn is_modified(&self) -> bool {
        self.clean_state != Some(self.text.state_id())
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.clean_state = if modified {
            None
        } else {
            Some(self.text.state_id())
        };
    }

    /// An empty, unmodified, untitled tab can be reused by a load.
    pub fn is_blank(&self) -> bool {
        self.is_untitled() && self.text.is_empty() && !self.is_modified()
    }

    /// Replace the whole content after a load or re-decode. The highlighter
    /// is dropped; block flags are meaningless for the new text.
    pub fn set_loaded_text(&mut self, text: &str, encoding: &str) {
        if self.highlighter.take().is_some() {
            debug!(doc = self.id.0, "highlighter dropped for text replacement");
        }
        self.text.set_text(text);
        self.encoding = encoding.to_string();
        self.word_count = None;
        self.cursor = TextPos::default();
        self.selections.clear();
        self.clean_state = Some(self.text.state_id());
    }

    pub fn apply_edit(&mut self, start: TextPos, end: TextPos, inserted: &str) -> BlockEdit {
        let edit = self.text.replace(start, end, inserted);
        self.after_edit(&edit);
        self.cursor = self.text.clamp(self.cursor);
        edit
    }

    pub fn undo(&mut self) -> Option<BlockEdit> {
        let edit = self.text.undo()?;
        self.after_edit(&edit);
        self.cursor = self.text.clamp(self.cursor);
        Some(edit)
    }

    pub fn redo(&mut self) -> Option<BlockEdit> {
        let edit = self.text.redo()?;
        self.after_edit(&edit);
        self.cursor = self.text.clamp(self.cursor);
        Some(edit)
    }

    fn after_edit(&mut self, edit: &BlockEdit) {
        self.word_count = None;
        if let Some(engine) = self.highlighter.as_mut() {
            engine.on_edit(edit);
        }
    }

    /// Drop the engine and every overlay it produced, right now.
    pub fn disable_highlighting(&mut self) {
        if self.highlighter.take().is_some() {
            debug!(doc = self.id.0, "highlighter destroyed");
        }
        self.selections.brackets.clear();
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighter.is_some()
    }

    /// Recompute bracket overlays at the cursor. Without an engine there are
    /// none.
    pub fn refresh_brackets(&mut self) {
        self.selections.brackets = match &self.highlighter {
            Some(engine) => engine.match_brackets(&self.text, self.cursor),
            None => Vec::new(),
        };
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        self.selections.combined()
    }

    /// Attach to `window`, replacing any previous signal set for it.
    /// Returns the previous owner when it was a different window.
    pub fn bind(&mut self, window: WindowId, signals: &[Signal]) -> Option<WindowId> {
        let previous = self.bindings.owner.filter(|w| *w != window);
        self.bindings.owner = Some(window);
        self.bindings.signals = signals.iter().copied().collect();
        previous
    }

    /// Sever every binding to `window`. Returns false when the record was
    /// not bound to it.
    pub fn unbind(&mut self, window: WindowId) -> bool {
        if self.bindings.owner != Some(window) {
            return false;
        }
        self.bindings = Bindings::default();
        true
    }

    pub fn add_signal(&mut self, signal: Signal) {
        if self.bindings.owner.is_some() {
            self.bindings.signals.insert(signal);
        }
    }

    pub fn remove_signal(&mut self, signal: Signal) {
        self.bindings.signals.remove(&signal);
    }

    pub fn bound_window(&self) -> Option<WindowId> {
        self.bindings.owner
    }

    pub fn is_bound(&self, window: WindowId, signal: Signal) -> bool {
        self.bindings.owner == Some(window) && self.bindings.signals.contains(&signal)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Whether the Run slot is occupied by a live child. Reaps a finished
    /// one so the slot frees up.
    pub fn has_running_process(&mut self) -> bool {
        let running = self.process.as_mut().is_some_and(|p| p.is_running());
        if !running && self.process.is_some() {
            self.collect_process_output();
            self.process = None;
        }
        running
    }

    /// Move pending script output into the log.
    pub fn collect_process_output(&mut self) -> usize {
        let Some(process) = &self.process else {
            return 0;
        };
        let chunks = process.drain_output();
        for chunk in &chunks {
            if !self.process_log.is_empty() {
                self.process_log.push('\n');
            }
            self.process_log.push_str(chunk.text());
        }
        chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord::new(DocumentId(1))
    }

    #[test]
    fn test_new_record_is_blank() {
        let doc = record();
        assert!(doc.is_blank());
        assert_eq!(doc.encoding, "UTF-8");
        assert_eq!(doc.word_count, None);
        assert!(doc.bindings().is_empty());
    }

    #[test]
    fn test_edit_sets_modified_and_undo_clears() {
        let mut doc = record();
        doc.word_count = Some(3);
        doc.apply_edit(TextPos::new(0, 0), TextPos::new(0, 0), "abc");
        assert!(doc.is_modified());
        assert_eq!(doc.word_count, None);
        doc.undo();
        assert!(!doc.is_modified());
        doc.redo();
        assert!(doc.is_modified());
    }

    #[test]
    fn test_set_modified_explicitly() {
        let mut doc = record();
        doc.set_modified(true);
        assert!(doc.is_modified());
        doc.set_modified(false);
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_loaded_text_is_clean() {
        let mut doc = record();
        doc.apply_edit(TextPos::new(0, 0), TextPos::new(0, 0), "x");
        doc.set_loaded_text("one\ntwo", "ISO-8859-1");
        assert!(!doc.is_modified());
        assert_eq!(doc.text.block_count(), 2);
        assert_eq!(doc.encoding, "ISO-8859-1");
    }

    #[test]
    fn test_bind_unbind() {
        let mut doc = record();
        let w1 = WindowId(1);
        let w2 = WindowId(2);
        assert_eq!(doc.bind(w1, &Signal::CORE), None);
        assert!(doc.is_bound(w1, Signal::UndoRedo));
        assert!(!doc.is_bound(w2, Signal::UndoRedo));
        assert!(!doc.unbind(w2));
        assert!(doc.unbind(w1));
        assert!(doc.bindings().is_empty());
        assert!(!doc.is_bound(w1, Signal::UndoRedo));
    }

    #[test]
    fn test_rebind_reports_previous_owner() {
        let mut doc = record();
        doc.bind(WindowId(1), &Signal::CORE);
        assert_eq!(doc.bind(WindowId(2), &[Signal::StatusBar]), Some(WindowId(1)));
        assert!(doc.is_bound(WindowId(2), Signal::StatusBar));
        assert!(!doc.is_bound(WindowId(2), Signal::UndoRedo));
    }

    #[test]
    fn test_optional_signals() {
        let mut doc = record();
        doc.add_signal(Signal::WordCount);
        assert!(doc.bindings().signals().is_empty());
        doc.bind(WindowId(3), &Signal::CORE);
        doc.add_signal(Signal::WordCount);
        assert!(doc.is_bound(WindowId(3), Signal::WordCount));
        doc.remove_signal(Signal::WordCount);
        assert!(!doc.is_bound(WindowId(3), Signal::WordCount));
    }

    #[test]
    fn test_overlay_sets_are_independent() {
        let mut doc = record();
        let search = Overlay {
            start: TextPos::new(0, 0),
            end: TextPos::new(0, 1),
            kind: OverlayKind::SearchMatch,
        };
        doc.selections.search.push(search.clone());
        doc.selections.brackets.push(Overlay {
            kind: OverlayKind::BracketMismatch,
            ..search.clone()
        });
        doc.disable_highlighting();
        assert!(doc.selections.brackets.is_empty());
        assert_eq!(doc.overlays(), vec![search]);
    }

    #[test]
    fn test_ids_are_unique() {
        let ids = IdAllocator::new();
        let a = ids.next_document();
        let b = ids.next_document();
        let w = ids.next_window();
        assert_ne!(a, b);
        assert_ne!(w.0, b.0);
    }
}
