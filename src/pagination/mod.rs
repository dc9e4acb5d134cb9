//! Pagination module
//!
//! Cursor pagination over GraphQL connections.
//!
//! # Overview
//!
//! Every stream is a Relay-style connection under
//! `data.<envelope_key>.data`. The paginator reads its `pageInfo` to decide
//! whether another page exists and which cursor continues from it.
//! `PaginationParameters` is the per-request bundle the driver threads
//! through its loop; it is replaced, never mutated, from page to page.

mod paginator;
mod types;

pub use paginator::GraphQlPaginator;
pub use types::{DateWindow, NextPage, PageInfo, PaginationParameters};
