//! Block-structured plain text with undo/redo.
//!
//! A block is one line without its terminating `\n`. Positions address a
//! block and a byte column inside it; columns are always snapped down to a
//! char boundary.

use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPos {
    pub block: usize,
    pub column: usize,
}

impl TextPos {
    pub fn new(block: usize, column: usize) -> Self {
        Self { block, column }
    }
}

/// Inclusive range of block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub first: usize,
    pub last: usize,
}

impl BlockRange {
    pub fn new(a: usize, b: usize) -> Self {
        Self { first: a.min(b), last: a.max(b) }
    }

    pub fn single(block: usize) -> Self {
        Self { first: block, last: block }
    }

    pub fn contains(&self, block: usize) -> bool {
        block >= self.first && block <= self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn overlaps(&self, other: &BlockRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    pub fn blocks(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }

    /// Restrict the range to a document of `block_count` blocks.
    /// Returns None when the range lies entirely past the end.
    pub fn clamp(&self, block_count: usize) -> Option<BlockRange> {
        if block_count == 0 || self.first >= block_count {
            return None;
        }
        Some(BlockRange {
            first: self.first,
            last: self.last.min(block_count - 1),
        })
    }
}

/// Describes how the block list changed: `removed` blocks starting at
/// `first_block` were replaced by `inserted` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEdit {
    pub first_block: usize,
    pub removed: usize,
    pub inserted: usize,
}

impl BlockEdit {
    /// Blocks whose content differs after the edit (post-edit numbering).
    pub fn changed_range(&self) -> BlockRange {
        BlockRange::new(self.first_block, self.first_block + self.inserted.max(1) - 1)
    }

    pub fn block_count_changed(&self) -> bool {
        self.removed != self.inserted
    }
}

#[derive(Debug, Clone)]
struct UndoStep {
    id: u64,
    start: TextPos,
    removed: String,
    inserted: String,
}

#[derive(Debug, Clone)]
pub struct TextBuffer {
    blocks: Vec<String>,
    undo: Vec<UndoStep>,
    redo: Vec<UndoStep>,
    next_step_id: u64,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            blocks: vec![String::new()],
            undo: Vec::new(),
            redo: Vec::new(),
            next_step_id: 1,
        }
    }

    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::new();
        buffer.set_text(text);
        buffer
    }

    /// Replace the whole content. Undo history is dropped.
    pub fn set_text(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n");
        self.blocks = normalized.split('\n').map(str::to_string).collect();
        self.undo.clear();
        self.redo.clear();
    }

    pub fn text(&self) -> String {
        self.blocks.join("\n")
    }

    pub fn block(&self, index: usize) -> Option<&str> {
        self.blocks.get(index).map(String::as_str)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn len_bytes(&self) -> usize {
        self.blocks.iter().map(String::len).sum::<usize>() + self.blocks.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.len() == 1 && self.blocks[0].is_empty()
    }

    pub fn end_pos(&self) -> TextPos {
        let block = self.blocks.len() - 1;
        TextPos::new(block, self.blocks[block].len())
    }

    /// Snap a position into the document and onto a char boundary.
    pub fn clamp(&self, pos: TextPos) -> TextPos {
        let block = pos.block.min(self.blocks.len() - 1);
        let line = &self.blocks[block];
        let mut column = pos.column.min(line.len());
        while !line.is_char_boundary(column) {
            column -= 1;
        }
        TextPos::new(block, column)
    }

    pub fn slice(&self, start: TextPos, end: TextPos) -> String {
        let (start, end) = self.ordered(start, end);
        if start.block == end.block {
            return self.blocks[start.block][start.column..end.column].to_string();
        }
        let mut out = self.blocks[start.block][start.column..].to_string();
        for block in &self.blocks[start.block + 1..end.block] {
            out.push('\n');
            out.push_str(block);
        }
        out.push('\n');
        out.push_str(&self.blocks[end.block][..end.column]);
        out
    }

    pub fn insert(&mut self, pos: TextPos, text: &str) -> BlockEdit {
        self.replace(pos, pos, text)
    }

    pub fn remove(&mut self, start: TextPos, end: TextPos) -> BlockEdit {
        self.replace(start, end, "")
    }

    /// Replace the text between two positions, recording an undo step.
    pub fn replace(&mut self, start: TextPos, end: TextPos, text: &str) -> BlockEdit {
        let text = text.replace("\r\n", "\n");
        let (start, end) = self.ordered(start, end);
        let removed = self.slice(start, end);
        let edit = self.splice(start, end, &text);
        let id = self.next_step_id;
        self.next_step_id += 1;
        self.undo.push(UndoStep { id, start, removed, inserted: text });
        self.redo.clear();
        edit
    }

    pub fn undo(&mut self) -> Option<BlockEdit> {
        let step = self.undo.pop()?;
        let end = advance(step.start, &step.inserted);
        let edit = self.splice(step.start, end, &step.removed);
        self.redo.push(step);
        Some(edit)
    }

    pub fn redo(&mut self) -> Option<BlockEdit> {
        let step = self.redo.pop()?;
        let end = advance(step.start, &step.removed);
        let edit = self.splice(step.start, end, &step.inserted);
        self.undo.push(step);
        Some(edit)
    }

    pub fn is_undo_available(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn is_redo_available(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Identifies the current point in the undo history; 0 is the state
    /// right after the last `set_text`.
    pub fn state_id(&self) -> u64 {
        self.undo.last().map_or(0, |s| s.id)
    }

    fn ordered(&self, a: TextPos, b: TextPos) -> (TextPos, TextPos) {
        let a = self.clamp(a);
        let b = self.clamp(b);
        if b < a { (b, a) } else { (a, b) }
    }

    fn splice(&mut self, start: TextPos, end: TextPos, text: &str) -> BlockEdit {
        let head = self.blocks[start.block][..start.column].to_string();
        let tail = self.blocks[end.block][end.column..].to_string();

        let mut new_blocks: Vec<String> = text.split('\n').map(str::to_string).collect();
        let last = new_blocks.len() - 1;
        new_blocks[0].insert_str(0, &head);
        new_blocks[last].push_str(&tail);

        let removed = end.block - start.block + 1;
        let inserted = new_blocks.len();
        self.blocks.splice(start.block..=end.block, new_blocks);

        BlockEdit { first_block: start.block, removed, inserted }
    }
}

/// Position reached after writing `text` starting at `start`.
fn advance(start: TextPos, text: &str) -> TextPos {
    match text.rfind('\n') {
        Some(i) => TextPos::new(start.block + text.matches('\n').count(), text.len() - i - 1),
        None => TextPos::new(start.block, start.column + text.len()),
    }
}
