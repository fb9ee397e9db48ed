//! Controllers layer - orchestration and coordination.
//!
//! This module contains controllers that coordinate between
//! domain models, services, and the view layer:
//! - Tab container with debounced switch notification
//! - Per-window workflows (load, save, close negotiation, scripts)
//! - Tab transfer between windows

pub mod tabs;
pub mod transfer;
pub mod window;
