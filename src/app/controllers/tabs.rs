use std::path::Path;
use std::time::{Duration, Instant};

use crate::app::domain::document::{DocumentId, DocumentRecord};

/// Quiet period before a tab switch is reported.
pub const SWITCH_DEBOUNCE: Duration = Duration::from_millis(50);

/// Reported once the active tab has been stable for the debounce period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabSwitch {
    pub index: usize,
    pub document: DocumentId,
}

/// Ordered tabs of one window. Order is display order.
#[derive(Debug)]
pub struct TabContainer {
    records: Vec<DocumentRecord>,
    active: Option<usize>,
    pending_switch: Option<Instant>,
    debounce: Duration,
}

impl Default for TabContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TabContainer {
    pub fn new() -> Self {
        Self::with_debounce(SWITCH_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            records: Vec::new(),
            active: None,
            pending_switch: None,
            debounce,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DocumentRecord> {
        self.records.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&DocumentRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DocumentRecord> {
        self.records.get_mut(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&DocumentRecord> {
        self.active.and_then(|i| self.records.get(i))
    }

    pub fn active_mut(&mut self) -> Option<&mut DocumentRecord> {
        self.active.and_then(|i| self.records.get_mut(i))
    }

    pub fn index_of(&self, id: DocumentId) -> Option<usize> {
        self.records.iter().position(|d| d.id == id)
    }

    /// Find a document by file path
    pub fn find_by_path(&self, path: &Path) -> Option<usize> {
        self.records.iter().position(|d| d.path() == Some(path))
    }

    /// Insert at `at` (clamped to the end). The first tab of an empty
    /// container becomes active; otherwise the active tab stays the same
    /// document. Returns the index used.
    pub fn insert(&mut self, record: DocumentRecord, at: usize) -> usize {
        let at = at.min(self.records.len());
        self.records.insert(at, record);
        match self.active {
            None => {
                self.active = Some(at);
                self.arm_switch(Instant::now());
            }
            Some(active) if at <= active => self.active = Some(active + 1),
            Some(_) => {}
        }
        at
    }

    /// Detach the record at `index` from the container; the caller decides
    /// whether it is destroyed or moved.
    ///
    /// A tab left of the active one shifts the active index down. Removing
    /// the active tab activates the one that takes its place, else the new
    /// last tab, else nothing.
    pub fn remove(&mut self, index: usize) -> Option<DocumentRecord> {
        if index >= self.records.len() {
            return None;
        }
        let record = self.records.remove(index);
        if let Some(active) = self.active {
            if index < active {
                self.active = Some(active - 1);
            } else if index == active {
                self.active = if self.records.is_empty() {
                    None
                } else {
                    Some(index.min(self.records.len() - 1))
                };
                self.arm_switch(Instant::now());
            }
        }
        if self.records.is_empty() {
            self.pending_switch = None;
        }
        Some(record)
    }

    /// Make `index` active. The switch notification is debounced: a burst
    /// of calls yields one `TabSwitch` for the final index.
    pub fn set_active(&mut self, index: usize, now: Instant) -> bool {
        if index >= self.records.len() {
            return false;
        }
        if self.active == Some(index) && self.pending_switch.is_none() {
            return true;
        }
        self.active = Some(index);
        self.arm_switch(now);
        true
    }

    fn arm_switch(&mut self, now: Instant) {
        self.pending_switch = Some(now);
    }

    pub fn has_pending_switch(&self) -> bool {
        self.pending_switch.is_some()
    }

    /// Deliver the pending switch once the container has been quiet for the
    /// debounce period.
    pub fn poll_switch(&mut self, now: Instant) -> Option<TabSwitch> {
        let since = self.pending_switch?;
        if now.saturating_duration_since(since) < self.debounce {
            return None;
        }
        self.pending_switch = None;
        let index = self.active?;
        Some(TabSwitch {
            index,
            document: self.records.get(index)?.id,
        })
    }

    /// Move a tab from one index to another. The active document stays
    /// active at its new index.
    pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
        if from >= self.records.len() || to >= self.records.len() {
            return false;
        }
        if from == to {
            return true;
        }
        let active_id = self.active().map(|d| d.id);
        let record = self.records.remove(from);
        self.records.insert(to, record);
        self.active = active_id.and_then(|id| self.index_of(id));
        true
    }

    /// Index after the active one; wraps to the first only with `wrap`.
    pub fn next_index(&self, wrap: bool) -> Option<usize> {
        let active = self.active?;
        if active + 1 < self.records.len() {
            Some(active + 1)
        } else if wrap && self.records.len() > 1 {
            Some(0)
        } else {
            None
        }
    }

    /// Index before the active one; wraps to the last only with `wrap`.
    pub fn previous_index(&self, wrap: bool) -> Option<usize> {
        let active = self.active?;
        if active > 0 {
            Some(active - 1)
        } else if wrap && self.records.len() > 1 {
            Some(self.records.len() - 1)
        } else {
            None
        }
    }
}
