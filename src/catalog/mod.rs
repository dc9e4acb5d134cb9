//! Stream catalog module
//!
//! Parse stream descriptors from YAML.
//!
//! # Overview
//!
//! The catalog module provides:
//! - `Catalog` - The set of streams the source can extract
//! - `StreamDefinition` - Immutable per-stream descriptor
//! - `PaginationMode` - How each stream's query is parameterized
//! - YAML parsing with validation, plus the embedded built-in catalog

mod parser;
mod types;

pub use parser::{builtin_catalog, load_catalog, load_catalog_from_str};
pub use types::{Catalog, PaginationMode, StreamDefinition};
