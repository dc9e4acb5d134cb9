//! GraphQL response decoding
//!
//! # Overview
//!
//! A page body is parsed once into a [`PageResponse`], which keeps the raw
//! envelope (numbers preserved verbatim) alongside its typed `errors` list.
//! The [`ResponseExtractor`] then unwraps `data.<key>.data.edges[].node`
//! into a lazy record sequence.

mod extractor;
mod types;

pub use extractor::{ResponseExtractor, Records};
pub use types::{ErrorExtensions, GraphQlError, PageResponse, RATE_LIMIT_CODE};
