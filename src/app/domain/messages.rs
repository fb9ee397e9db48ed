//! Values that leave a window controller: banners, events for the view
//! layer, and the drag payload exchanged between windows.

use std::fmt;
use std::str::FromStr;

use crate::app::domain::document::{DocumentId, WindowId};
use crate::app::domain::text::BlockRange;
use crate::app::infrastructure::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Inline, dismissible banner. A newer one replaces the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub detail: Option<String>,
}

impl Notification {
    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            title: title.into(),
            detail: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Enablement of the window's actions for the active tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionState {
    pub save: bool,
    pub reload: bool,
    pub undo: bool,
    pub redo: bool,
    pub detach: bool,
    pub next_prev: bool,
    pub close_other: bool,
    pub run_visible: bool,
    pub editable: bool,
}

/// What the view layer has to react to. Drained with
/// `WindowController::take_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    CurrentTabChanged { index: usize, document: DocumentId },
    TabsEmptied,
    TitleChanged(String),
    TabTextChanged { document: DocumentId, text: String },
    ModificationChanged { document: DocumentId, modified: bool },
    UndoAvailable(bool),
    RedoAvailable(bool),
    ActionStateChanged(ActionState),
    StatusBarChanged(DocumentId),
    WordCountChanged { document: DocumentId, count: usize },
    OverlaysChanged(DocumentId),
    RepaintRequested { document: DocumentId, range: BlockRange },
    LoadingChanged(bool),
    BannerShown(Notification),
    BannerClosed,
    PointerGrabReleased,
    ProcessOutput(DocumentId),
    FontChanged,
    CloseScheduled,
}

/// Identifies a dragged tab: source window and its index there.
/// Text form is `"<window>+<index>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragPayload {
    pub window: WindowId,
    pub index: usize,
}

impl fmt::Display for DragPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.window.0, self.index)
    }
}

impl FromStr for DragPayload {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TransferError::MalformedPayload(s.to_string());
        let (window, index) = s.split_once('+').ok_or_else(malformed)?;
        let window = window.parse::<u64>().map_err(|_| malformed())?;
        let index = index.parse::<usize>().map_err(|_| malformed())?;
        Ok(Self {
            window: WindowId(window),
            index,
        })
    }
}
