//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared, optionally file-backed sync state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file (empty for in-memory)
    path: PathBuf,
    /// Current state
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create a state manager writing to `path`, starting empty
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_state(path.as_ref().to_path_buf(), State::new())
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(PathBuf::new(), State::new())
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents, "state file")?
        } else {
            State::new()
        };

        Ok(Self::with_state(path, state))
    }

    /// Create an in-memory state manager from inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(PathBuf::new(), parse_state(json, "state JSON")?))
    }

    fn with_state(path: PathBuf, state: State) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Persist the current state, if file-backed
    ///
    /// Writes a sibling temp file and renames it over the target so a crash
    /// never leaves a truncated state file behind.
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = self.to_json_pretty().await?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!("State saved to {}", self.path.display());
        Ok(())
    }

    /// Create a checkpoint (alias for save)
    pub async fn checkpoint(&self) -> Result<()> {
        self.save().await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Bookmark value for a stream
    pub async fn bookmark(&self, stream: &str) -> Option<String> {
        let state = self.state.read().await;
        state.bookmark(stream).map(ToString::to_string)
    }

    /// Bookmark for a stream as a timestamp
    pub async fn bookmark_timestamp(&self, stream: &str) -> Option<DateTime<Utc>> {
        let state = self.state.read().await;
        state.get_stream(stream)?.bookmark_timestamp()
    }

    /// Advance a stream's bookmark if `value` is newer
    pub async fn advance_bookmark(&self, stream: &str, replication_key: &str, value: &Value) -> bool {
        let mut state = self.state.write().await;
        state.advance_bookmark(stream, replication_key, value)
    }

    /// Check if a child run under `parent_id` already finished
    pub async fn is_parent_completed(&self, stream: &str, parent_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .get_stream(stream)
            .is_some_and(|s| s.is_parent_completed(parent_id))
    }

    /// Record a child run under `parent_id` as finished
    pub async fn mark_parent_completed(&self, stream: &str, parent_id: &str) {
        let mut state = self.state.write().await;
        state.get_stream_mut(stream).mark_parent_completed(parent_id);
    }

    /// Record parents that still need a child run
    ///
    /// Returns how many were not already pending.
    pub async fn add_pending_parents<'a, I>(&self, stream: &str, parent_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.state.write().await;
        let stream_state = state.get_stream_mut(stream);
        parent_ids
            .into_iter()
            .filter(|id| stream_state.add_pending_parent(id))
            .count()
    }

    /// Parents recorded as needing a child run
    pub async fn pending_parents(&self, stream: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .get_stream(stream)
            .map(|s| s.pending_parents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a child stream's completed and pending parents
    pub async fn clear_parents(&self, stream: &str) {
        let mut state = self.state.write().await;
        if let Some(s) = state.bookmarks.get_mut(stream) {
            s.clear_parents();
        }
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

fn parse_state(json: &str, what: &str) -> Result<State> {
    if json.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(json).map_err(|e| Error::state(format!("Failed to parse {what}: {e}")))
}
