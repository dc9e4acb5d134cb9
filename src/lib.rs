// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # ShipHero source
//!
//! Incremental extraction of ShipHero's public GraphQL API.
//!
//! ## Features
//!
//! - **Query templates**: one `.graphql` file per stream, with `$cursor`,
//!   `$updated_from`, `$date_from`, `$date_to` and `$order_id` placeholders
//! - **Cursor pagination**: Relay-style `pageInfo` on every connection
//! - **Rate-limit aware retries**: waits exactly as long as the API asks
//!   when it answers with error code 30
//! - **Incremental sync**: forward-only bookmarks, checkpointed every page
//! - **Child streams**: one run per parent record (order history per order)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shiphero_source::catalog::builtin_catalog;
//! use shiphero_source::engine::SyncEngine;
//! use shiphero_source::http::GraphQlClient;
//! use shiphero_source::queries::EmbeddedTemplates;
//! use shiphero_source::state::StateManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> shiphero_source::Result<()> {
//!     let client = GraphQlClient::new(Default::default(), "access-token")?;
//!     let catalog = builtin_catalog()?;
//!     let mut engine = SyncEngine::new(
//!         Arc::new(client),
//!         Arc::new(EmbeddedTemplates),
//!         StateManager::in_memory(),
//!     );
//!
//!     let vendors = catalog.get("vendors").expect("built-in stream");
//!     engine
//!         .sync_stream(vendors, None, &mut |msg| {
//!             println!("{}", msg.to_json_line()?);
//!             Ok(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Stream Pagination Driver                    │
//! │  render → send (retry) → paginate → extract → bookmark → repeat │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Template │   HTTP    │   Paginate    │  Decode   │    State    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Cursor   │ Transport │ pageInfo      │ Envelope  │ Bookmarks   │
//! │ Updated  │ Retry     │ endCursor     │ Edges     │ Parents     │
//! │ Window   │ Rate Limit│ hasNextPage   │ Errors    │ Checkpoint  │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Runtime configuration
pub mod config;

/// Stream catalog
pub mod catalog;

/// Query template sources
pub mod queries;

/// Query template rendering
pub mod template;

/// Cursor pagination
pub mod pagination;

/// Response envelopes and record extraction
pub mod decode;

/// Transport, retry policy and rate limiting
pub mod http;

/// Refresh-token authentication
pub mod auth;

/// State management and checkpointing
pub mod state;

/// Parent contexts for child streams
pub mod partition;

/// Main execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::{builtin_catalog, Catalog, PaginationMode, StreamDefinition};
pub use config::TapConfig;
pub use engine::{Message, SyncEngine};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
