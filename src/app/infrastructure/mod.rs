//! Infrastructure layer - external integrations and utilities.
//!
//! Error types shared by every layer.

pub mod error;
