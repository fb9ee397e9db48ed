//! Application layer - organized by Clean Architecture principles.
//!
//! # Structure
//!
//! - `domain/` - Core data structures (DocumentRecord, Settings, Messages, TextBuffer)
//! - `controllers/` - Orchestration (TabContainer, WindowController, tab transfer)
//! - `services/` - Business operations (loader, process, text_ops, syntax)
//! - `infrastructure/` - Error types
//! - `registry.rs` - Window registry
//! - `state.rs` - Main application coordinator

pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod registry;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient external access
pub use controllers::tabs::{TabContainer, TabSwitch};
pub use controllers::window::{AutoAnswer, DialogHost, SaveChoice, UnsavedPrompt, ViewOptions, WindowController};
pub use domain::{AppSettings, DocumentId, DocumentRecord, DragPayload, WindowEvent, WindowId};
pub use infrastructure::error::{AppError, TransferError};
pub use registry::WindowRegistry;
pub use services::loader::{BasicCodec, FsLoader, Loader, ManualLoader};
pub use state::App;
