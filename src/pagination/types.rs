//! Pagination types
//!
//! Defines the per-request parameter bundle and the page metadata it is
//! advanced from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `pageInfo` block of a connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    /// Cursor of the last edge on this page
    #[serde(rename = "endCursor", default)]
    pub end_cursor: Option<String>,
    /// Whether a page follows this one
    #[serde(rename = "hasNextPage", default)]
    pub has_next_page: bool,
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch the page after this cursor
    Continue {
        /// `endCursor` of the page just read
        cursor: String,
    },
    /// No more pages
    Done,
}

/// Inclusive date window for `DateRange` streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// `$date_from`
    pub from: NaiveDate,
    /// `$date_to`
    pub to: NaiveDate,
}

impl DateWindow {
    /// Create a window
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }
}

/// Parameters for a single request of a stream run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaginationParameters {
    /// Cursor to continue after (absent on the first page)
    pub cursor: Option<String>,
    /// Lower bound for `IncrementalTimestamp` streams
    pub starting_timestamp: Option<DateTime<Utc>>,
    /// Window for `DateRange` streams
    pub date_window: Option<DateWindow>,
    /// Parent identifier for `ChildContext` streams
    pub parent_id: Option<String>,
}

impl PaginationParameters {
    /// Parameters for the first page, with nothing bound
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the replication starting timestamp
    #[must_use]
    pub fn with_starting_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.starting_timestamp = Some(ts);
        self
    }

    /// Bind the date window
    #[must_use]
    pub fn with_date_window(mut self, window: DateWindow) -> Self {
        self.date_window = Some(window);
        self
    }

    /// Bind the parent identifier
    #[must_use]
    pub fn with_parent_id(mut self, id: impl Into<String>) -> Self {
        self.parent_id = Some(id.into());
        self
    }

    /// Parameters for the page following `cursor`
    ///
    /// Everything except the cursor is carried over unchanged.
    pub fn after(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            ..self.clone()
        }
    }

    /// Whether these parameters address the first page
    pub fn is_first_page(&self) -> bool {
        self.cursor.is_none()
    }
}
