use syntect::highlighting::HighlightState;
use syntect::parsing::ParseState;

use crate::app::domain::text::BlockEdit;

/// A run of bytes inside one block sharing a style character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpan {
    pub start: usize,
    pub end: usize,
    pub style: char,
}

/// Parser and highlighter states at a block boundary.
#[derive(Clone, PartialEq)]
pub struct LineState {
    pub parse: ParseState,
    pub highlight: HighlightState,
}

/// Highlighting bookkeeping for one block.
#[derive(Clone, Default)]
pub struct BlockState {
    pub highlighted: bool,
    pub spans: Vec<StyleSpan>,
    /// State after the block's last byte; `None` until the block has been
    /// highlighted at least once.
    pub end_state: Option<LineState>,
}

/// One `BlockState` per text block, kept aligned with the block list.
#[derive(Clone, Default)]
pub struct BlockStates {
    blocks: Vec<BlockState>,
}

impl BlockStates {
    pub fn with_len(block_count: usize) -> Self {
        Self {
            blocks: vec![BlockState::default(); block_count],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, block: usize) -> Option<&BlockState> {
        self.blocks.get(block)
    }

    pub fn get_mut(&mut self, block: usize) -> Option<&mut BlockState> {
        self.blocks.get_mut(block)
    }

    pub fn is_highlighted(&self, block: usize) -> bool {
        self.blocks.get(block).is_some_and(|b| b.highlighted)
    }

    pub fn invalidate(&mut self, block: usize) {
        if let Some(b) = self.blocks.get_mut(block) {
            b.highlighted = false;
        }
    }

    /// State to resume parsing at the start of `block`.
    pub fn start_state(&self, block: usize) -> Option<&LineState> {
        let prev = block.checked_sub(1)?;
        self.blocks.get(prev)?.end_state.as_ref()
    }

    /// Mirror a block-list edit: replaced blocks become fresh unhighlighted
    /// entries, and the block right after the edit is invalidated too since
    /// a multi-line construct may now end elsewhere.
    pub fn apply_edit(&mut self, edit: &BlockEdit) {
        let start = edit.first_block.min(self.blocks.len());
        let end = (edit.first_block + edit.removed).min(self.blocks.len());
        self.blocks.splice(
            start..end,
            std::iter::repeat_with(BlockState::default).take(edit.inserted),
        );
        self.invalidate(edit.first_block + edit.inserted);
    }

    pub fn highlighted_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.highlighted).count()
    }
}
