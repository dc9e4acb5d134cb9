//! Parent contexts for child streams
//!
//! # Overview
//!
//! A child stream (`ChildContext` pagination) is only queryable beneath one
//! parent record at a time. While the parent stream runs, a
//! [`ParentRouter`] observes each emitted parent record and collects the
//! distinct identifiers; the engine then runs the child once per
//! [`ParentContext`], each with its own fresh cursor.

mod routers;
mod types;

pub use routers::{extract_json_path, ParentRouter};
pub use types::ParentContext;
