//! Domain layer - core data structures and types.
//!
//! This module contains the fundamental domain models:
//! - Block-structured text with undo/redo
//! - Document records, ids and window bindings
//! - Application settings
//! - Events, banners and the drag payload

pub mod document;
pub mod messages;
pub mod settings;
pub mod text;

pub use document::{DocumentId, DocumentRecord, IdAllocator, Overlay, OverlayKind, Signal, WindowId};
pub use messages::{ActionState, DragPayload, Notification, Severity, WindowEvent};
pub use settings::{AppSettings, FontSpec, SyntaxTheme, WindowSize};
pub use text::{BlockEdit, BlockRange, TextBuffer, TextPos};
