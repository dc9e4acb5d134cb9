//! Parent router implementation

use super::types::ParentContext;
use crate::catalog::{PaginationMode, StreamDefinition};
use serde_json::Value;
use std::collections::HashSet;

/// Collects parent identifiers from a parent stream's records
///
/// Identifiers are kept in first-seen order and deduplicated, so a parent
/// that shows up on two pages yields one child run.
#[derive(Debug, Clone)]
pub struct ParentRouter {
    /// Parent stream name
    parent_stream: String,
    /// Key to extract from parent records
    parent_key: String,
    /// Child stream the collected parents are for
    child_stream: Option<String>,
    /// Collected contexts
    contexts: Vec<ParentContext>,
    /// Identifiers already collected
    seen: HashSet<String>,
    /// Contexts before this index were already handed to `take_new`
    taken: usize,
}

impl ParentRouter {
    /// Create a router for records of `parent_stream`
    pub fn new(parent_stream: impl Into<String>, parent_key: impl Into<String>) -> Self {
        Self {
            parent_stream: parent_stream.into(),
            parent_key: parent_key.into(),
            child_stream: None,
            contexts: Vec::new(),
            seen: HashSet::new(),
            taken: 0,
        }
    }

    /// Create the router a child stream needs, if it is one
    pub fn for_child(child: &StreamDefinition) -> Option<Self> {
        match &child.pagination {
            PaginationMode::ChildContext {
                parent_stream,
                parent_key,
            } => {
                let mut router = Self::new(parent_stream.clone(), parent_key.clone());
                router.child_stream = Some(child.name.clone());
                Some(router)
            }
            _ => None,
        }
    }

    /// Parent stream this router reads
    pub fn parent_stream(&self) -> &str {
        &self.parent_stream
    }

    /// Child stream the parents are collected for, when built with
    /// [`ParentRouter::for_child`]
    pub fn child_stream(&self) -> Option<&str> {
        self.child_stream.as_deref()
    }

    /// Record the identifier of one parent record
    ///
    /// Returns whether a new context was added. Records without a scalar
    /// value at the parent key are ignored.
    pub fn observe(&mut self, record: &Value) -> bool {
        let Some(id) = self.extract_key(record) else {
            return false;
        };
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.contexts
            .push(ParentContext::new(self.parent_stream.clone(), id));
        true
    }

    /// Contexts collected so far
    pub fn contexts(&self) -> &[ParentContext] {
        &self.contexts
    }

    /// Contexts collected since the previous call
    pub fn take_new(&mut self) -> &[ParentContext] {
        let start = self.taken;
        self.taken = self.contexts.len();
        &self.contexts[start..]
    }

    /// Consume into the collected contexts
    pub fn into_contexts(self) -> Vec<ParentContext> {
        self.contexts
    }

    /// Number of distinct parents seen
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no parent has been seen
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn extract_key(&self, record: &Value) -> Option<String> {
        match extract_json_path(record, &self.parent_key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Look up a dotted path (`"id"`, `"$.shipping.address"`, `"lines[0].sku"`)
pub fn extract_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        if let Some(bracket_pos) = part.find('[') {
            let key = &part[..bracket_pos];
            let idx: usize = part[bracket_pos + 1..].strip_suffix(']')?.parse().ok()?;
            if !key.is_empty() {
                current = current.get(key)?;
            }
            current = current.get(idx)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current)
}
