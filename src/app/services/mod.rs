//! Services layer - business operations and utilities.
//!
//! This module contains business logic and operations:
//! - File loading and text decoding
//! - Script execution
//! - Text operations (word count, titles, search)
//! - Syntax highlighting

pub mod loader;
pub mod process;
pub mod syntax;
pub mod text_ops;
