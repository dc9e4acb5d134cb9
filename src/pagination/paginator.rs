//! GraphQL connection paginator

use super::types::{NextPage, PageInfo};
use serde_json::Value;
use tracing::warn;

/// Reads `data.<stream_key>.data.pageInfo` from a response envelope
///
/// A missing or malformed `pageInfo` ends pagination instead of failing
/// the run.
#[derive(Debug, Clone)]
pub struct GraphQlPaginator {
    stream_key: String,
}

impl GraphQlPaginator {
    /// Create a paginator for the given envelope key
    pub fn new(stream_key: impl Into<String>) -> Self {
        Self {
            stream_key: stream_key.into(),
        }
    }

    /// Envelope key this paginator reads
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Parse the `pageInfo` block, if present and well-formed
    pub fn page_info(&self, envelope: &Value) -> Option<PageInfo> {
        let page_info = envelope
            .get("data")?
            .get(&self.stream_key)?
            .get("data")?
            .get("pageInfo")?;
        serde_json::from_value(page_info.clone()).ok()
    }

    /// Whether another page follows
    pub fn has_more(&self, envelope: &Value) -> bool {
        self.page_info(envelope).is_some_and(|p| p.has_next_page)
    }

    /// The cursor to continue from
    pub fn extract_cursor(&self, envelope: &Value) -> Option<String> {
        self.page_info(envelope)?.end_cursor
    }

    /// Same as [`has_more`](Self::has_more) on an unparsed body
    pub fn has_more_body(&self, body: &str) -> bool {
        serde_json::from_str::<Value>(body).is_ok_and(|v| self.has_more(&v))
    }

    /// Same as [`extract_cursor`](Self::extract_cursor) on an unparsed body
    pub fn extract_cursor_body(&self, body: &str) -> Option<String> {
        let envelope: Value = serde_json::from_str(body).ok()?;
        self.extract_cursor(&envelope)
    }

    /// Decide the next page from a response envelope
    pub fn next_page(&self, envelope: &Value) -> NextPage {
        let Some(info) = self.page_info(envelope) else {
            return NextPage::Done;
        };

        if !info.has_next_page {
            return NextPage::Done;
        }

        match info.end_cursor {
            Some(cursor) if !cursor.is_empty() => NextPage::Continue { cursor },
            // Following would refetch the first page forever
            _ => {
                warn!(
                    "{}: hasNextPage is true but endCursor is missing, stopping",
                    self.stream_key
                );
                NextPage::Done
            }
        }
    }
}
