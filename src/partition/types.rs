//! Partition types

use serde::{Deserialize, Serialize};

/// One parent record a child stream runs beneath
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentContext {
    /// Parent stream name
    pub parent_stream: String,
    /// Identifier bound to the child's `$order_id`
    pub id: String,
}

impl ParentContext {
    /// Create a parent context
    pub fn new(parent_stream: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            parent_stream: parent_stream.into(),
            id: id.into(),
        }
    }
}
