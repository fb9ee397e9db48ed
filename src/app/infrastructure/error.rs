use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Save error: {0}")]
    Save(String),

    #[error("Encoding error: cannot represent text as {0}")]
    Encoding(String),

    #[error("Another process is running in this tab")]
    ProcessRunning,

    #[error("Not runnable: {0}")]
    NotRunnable(String),

    #[error("Another window has a modal dialog")]
    AnotherDialog,
}

/// Convenience type alias for Results with AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Reasons a detach or drop is refused. All of them abort silently after the
/// pointer grab on the tab bar is released.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("malformed drag payload: {0:?}")]
    MalformedPayload(String),

    #[error("source window {0} no longer exists")]
    UnknownSource(u64),

    #[error("tab dropped onto its own window")]
    SelfDrop,

    #[error("window is busy loading")]
    NotReady,

    #[error("window has no tab that can be detached")]
    NothingToDetach,

    #[error("no tab at index {0}")]
    InvalidIndex(usize),
}
