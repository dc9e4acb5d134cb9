//! State management module
//!
//! Handles bookmark tracking, checkpointing, and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - per-stream bookmarks and completed child contexts
//! - `StateManager` - shared handle with atomic file persistence
//! - forward-only bookmark comparison

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{compare_bookmarks, State, StreamState};
