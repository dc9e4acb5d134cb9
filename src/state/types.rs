//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs. The
//! layout (`bookmarks.<stream>.replication_key_value`) matches what Singer
//! targets expect to echo back.

use crate::template::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Complete state for the source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Bookmark value for a stream
    pub fn bookmark(&self, stream: &str) -> Option<&str> {
        self.bookmarks.get(stream)?.bookmark()
    }

    /// Advance a stream's bookmark; see [`StreamState::advance`]
    pub fn advance_bookmark(&mut self, stream: &str, replication_key: &str, value: &Value) -> bool {
        self.get_stream_mut(stream).advance(replication_key, value)
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Field the bookmark was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication key value seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<String>,

    /// Parent ids whose child run finished (child streams only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_parents: BTreeSet<String>,

    /// Parent ids seen by the parent stream whose child run has not
    /// finished yet (child streams only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending_parents: BTreeSet<String>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bookmark value
    pub fn bookmark(&self) -> Option<&str> {
        self.replication_key_value.as_deref()
    }

    /// Current bookmark as a timestamp, if it parses as one
    pub fn bookmark_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bookmark().and_then(parse_timestamp)
    }

    /// Move the bookmark forward to `value` if it is newer
    ///
    /// Null and non-scalar values are ignored. Returns whether the bookmark
    /// changed.
    pub fn advance(&mut self, replication_key: &str, value: &Value) -> bool {
        let Some(candidate) = bookmark_text(value) else {
            return false;
        };

        let newer = match self.replication_key_value.as_deref() {
            Some(current) => compare_bookmarks(&candidate, current) == Ordering::Greater,
            None => true,
        };

        if newer {
            self.replication_key = Some(replication_key.to_string());
            self.replication_key_value = Some(candidate);
        }
        newer
    }

    /// Check if a parent's child run is done
    pub fn is_parent_completed(&self, parent_id: &str) -> bool {
        self.completed_parents.contains(parent_id)
    }

    /// Record a parent's child run as done
    pub fn mark_parent_completed(&mut self, parent_id: &str) {
        self.completed_parents.insert(parent_id.to_string());
    }

    /// Record a parent that still needs a child run
    pub fn add_pending_parent(&mut self, parent_id: &str) -> bool {
        self.pending_parents.insert(parent_id.to_string())
    }

    /// Forget parent bookkeeping once every parent's child run succeeded
    pub fn clear_parents(&mut self) {
        self.completed_parents.clear();
        self.pending_parents.clear();
    }
}

fn bookmark_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Order two bookmark values
///
/// Timestamps compare as instants, so `+02:00` and `Z` forms of the same
/// moment are equal; numbers compare numerically; anything else falls back
/// to string order.
pub fn compare_bookmarks(a: &str, b: &str) -> Ordering {
    if let (Some(x), Some(y)) = (parse_timestamp(a), parse_timestamp(b)) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        if let Some(ordering) = x.partial_cmp(&y) {
            return ordering;
        }
    }
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.bookmarks.is_empty());
        assert!(state.bookmark("orders").is_none());
    }

    #[test]
    fn test_bookmark_only_moves_forward() {
        let mut state = State::new();

        assert!(state.advance_bookmark("orders", "updated_at", &json!("2024-01-02T00:00:00Z")));
        assert!(!state.advance_bookmark("orders", "updated_at", &json!("2024-01-01T00:00:00Z")));
        assert!(!state.advance_bookmark("orders", "updated_at", &json!("2024-01-02T00:00:00Z")));
        assert_eq!(state.bookmark("orders"), Some("2024-01-02T00:00:00Z"));

        assert!(state.advance_bookmark("orders", "updated_at", &json!("2024-01-03T08:00:00")));
        assert_eq!(state.bookmark("orders"), Some("2024-01-03T08:00:00"));
    }

    #[test]
    fn test_bookmark_compares_instants_not_text() {
        let mut stream = StreamState::new();
        stream.advance("updated_at", &json!("2024-01-01T12:00:00Z"));

        // Same instant written with an offset sorts lower as text
        assert!(!stream.advance("updated_at", &json!("2024-01-01T14:00:00+02:00")));
        // Later instant that sorts lower as text
        assert!(stream.advance("updated_at", &json!("2024-01-01T13:30:00+01:00")));
        assert_eq!(
            stream.bookmark_timestamp().unwrap().to_rfc3339(),
            "2024-01-01T12:30:00+00:00"
        );
    }

    #[test]
    fn test_bookmark_ignores_null_and_blank() {
        let mut stream = StreamState::new();
        assert!(!stream.advance("updated_at", &Value::Null));
        assert!(!stream.advance("updated_at", &json!("  ")));
        assert!(!stream.advance("updated_at", &json!({"nested": 1})));
        assert!(stream.bookmark().is_none());
    }

    #[test]
    fn test_numeric_bookmarks() {
        let mut stream = StreamState::new();
        assert!(stream.advance("seq", &json!(9)));
        assert!(stream.advance("seq", &json!(10)));
        assert!(!stream.advance("seq", &json!(2)));
        assert_eq!(stream.bookmark(), Some("10"));
    }

    #[test]
    fn test_compare_bookmarks_fallback() {
        assert_eq!(compare_bookmarks("b", "a"), Ordering::Greater);
        assert_eq!(compare_bookmarks("2024-01-01", "2024-01-01T00:00:00Z"), Ordering::Equal);
    }

    #[test]
    fn test_completed_parents() {
        let mut stream = StreamState::new();
        assert!(!stream.is_parent_completed("o1"));

        stream.mark_parent_completed("o1");
        assert!(stream.is_parent_completed("o1"));
        assert!(!stream.is_parent_completed("o2"));

        assert!(stream.add_pending_parent("o2"));
        assert!(!stream.add_pending_parent("o2"));

        stream.clear_parents();
        assert!(!stream.is_parent_completed("o1"));
        assert!(stream.pending_parents.is_empty());
    }

    #[test]
    fn test_state_serialization_shape() {
        let mut state = State::new();
        state.advance_bookmark("orders", "updated_at", &json!("2024-01-01T00:00:00Z"));
        state.get_stream_mut("order_history").mark_parent_completed("o1");
        state.get_stream_mut("order_history").add_pending_parent("o2");

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({"bookmarks": {
                "order_history": {"completed_parents": ["o1"], "pending_parents": ["o2"]},
                "orders": {"replication_key": "updated_at", "replication_key_value": "2024-01-01T00:00:00Z"}
            }})
        );

        let restored: State = serde_json::from_value(value).unwrap();
        assert_eq!(restored, state);
    }
}
