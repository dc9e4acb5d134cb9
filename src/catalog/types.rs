//! Catalog types
//!
//! Declarative stream descriptors for YAML parsing.

use crate::types::SyncMode;
use serde::{Deserialize, Serialize};

// ============================================================================
// Catalog
// ============================================================================

/// Top-level catalog of streams the source can extract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Catalog {
    /// Source name
    pub name: String,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Names of all streams, in catalog order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Streams that run beneath the given parent
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a StreamDefinition> {
        self.streams
            .iter()
            .filter(move |s| s.parent_stream() == Some(parent))
    }
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Immutable descriptor of one extractable entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Primary key fields
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Field whose value is tracked as the replication bookmark
    #[serde(default)]
    pub replication_key: Option<String>,
    /// How requests for this stream are parameterized
    pub pagination: PaginationMode,
    /// Key the API uses for this entity in the response envelope
    #[serde(default)]
    pub envelope_key: Option<String>,
    /// Query template name (defaults to the stream name)
    #[serde(default)]
    pub query: Option<String>,
}

impl StreamDefinition {
    /// Create a cursor-only stream definition
    pub fn new(name: impl Into<String>, pagination: PaginationMode) -> Self {
        Self {
            name: name.into(),
            primary_key: vec!["id".to_string()],
            replication_key: None,
            pagination,
            envelope_key: None,
            query: None,
        }
    }

    /// Set the replication key
    #[must_use]
    pub fn with_replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    /// Set the response envelope alias
    #[must_use]
    pub fn with_envelope_key(mut self, key: impl Into<String>) -> Self {
        self.envelope_key = Some(key.into());
        self
    }

    /// Key under `data` holding this stream's connection
    pub fn envelope_key(&self) -> &str {
        self.envelope_key.as_deref().unwrap_or(&self.name)
    }

    /// Name used to look up the query template
    pub fn template_name(&self) -> &str {
        self.query.as_deref().unwrap_or(&self.name)
    }

    /// Parent stream name for child-context streams
    pub fn parent_stream(&self) -> Option<&str> {
        match &self.pagination {
            PaginationMode::ChildContext { parent_stream, .. } => Some(parent_stream),
            _ => None,
        }
    }

    /// Sync modes this stream supports
    pub fn supported_sync_modes(&self) -> Vec<SyncMode> {
        if self.replication_key.is_some() {
            vec![SyncMode::FullRefresh, SyncMode::Incremental]
        } else {
            vec![SyncMode::FullRefresh]
        }
    }
}

// ============================================================================
// Pagination Mode
// ============================================================================

/// How a stream's query is parameterized beyond the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationMode {
    /// Cursor only, full table on every run
    CursorOnly,
    /// Cursor plus `$updated_from` taken from the bookmark or start date
    IncrementalTimestamp,
    /// Cursor plus an explicit `[$date_from, $date_to]` window
    DateRange,
    /// Cursor plus `$order_id` from a parent stream record
    ChildContext {
        /// Parent stream name
        parent_stream: String,
        /// Field of the parent record holding the identifier
        #[serde(default = "default_parent_key")]
        parent_key: String,
    },
}

fn default_parent_key() -> String {
    "id".to_string()
}
