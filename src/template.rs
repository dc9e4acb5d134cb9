//! Query template rendering
//!
//! Resolves the `$cursor`, `$updated_from`, `$date_from`, `$date_to` and
//! `$order_id` placeholders of a GraphQL query template. Substitution is
//! plain text replacement of quoted scalars; which placeholders are bound
//! depends on the stream's [`PaginationMode`].

use crate::catalog::{PaginationMode, StreamDefinition};
use crate::error::{Error, Result};
use crate::pagination::{DateWindow, PaginationParameters};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Cursor placeholder
pub const CURSOR: &str = "$cursor";
/// Optional argument clause removed on the first page
pub const CURSOR_CLAUSE: &str = ", after: $cursor";
/// Replication lower bound placeholder
pub const UPDATED_FROM: &str = "$updated_from";
/// Window start placeholder
pub const DATE_FROM: &str = "$date_from";
/// Window end placeholder
pub const DATE_TO: &str = "$date_to";
/// Parent identifier placeholder
pub const ORDER_ID: &str = "$order_id";

/// Regex matching any recognized placeholder token
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(cursor|updated_from|date_from|date_to|order_id)\b")
        .expect("placeholder regex is valid")
});

/// Render a query template for one request
///
/// Fails with a configuration error when the stream's mode needs a value
/// `params` does not carry, and with [`Error::UnresolvedPlaceholder`] when
/// the template uses a placeholder its mode never binds.
pub fn render(
    template: &str,
    stream: &StreamDefinition,
    params: &PaginationParameters,
) -> Result<String> {
    let mut query = match &params.cursor {
        Some(cursor) => template.replace(CURSOR, &quote(cursor)),
        None => template.replace(CURSOR_CLAUSE, ""),
    };

    match &stream.pagination {
        PaginationMode::CursorOnly => {}
        PaginationMode::IncrementalTimestamp => {
            if stream.replication_key.is_some() {
                let starting = params.starting_timestamp.ok_or_else(|| {
                    Error::config(format!(
                        "Stream '{}' has no start_date configured and no previous bookmark",
                        stream.name
                    ))
                })?;
                query = query.replace(UPDATED_FROM, &quote(&format_timestamp(&starting)));
            }
        }
        PaginationMode::DateRange => {
            let window = params.date_window.ok_or_else(|| {
                Error::config(format!(
                    "No start_date configured and no previous bookmark found for '{}'. \
                     Set 'start_date' in the configuration for the initial sync.",
                    stream.name
                ))
            })?;
            query = query
                .replace(DATE_FROM, &quote(&format_date(window.from)))
                .replace(DATE_TO, &quote(&format_date(window.to)));
        }
        PaginationMode::ChildContext { parent_stream, .. } => {
            let parent_id = params.parent_id.as_deref().ok_or_else(|| {
                Error::config(format!(
                    "Stream '{}' can only be queried beneath a '{parent_stream}' record",
                    stream.name
                ))
            })?;
            query = query.replace(ORDER_ID, &quote(parent_id));
        }
    }

    let leftover = unresolved_placeholders(&query);
    if !leftover.is_empty() {
        return Err(Error::UnresolvedPlaceholder {
            stream: stream.name.clone(),
            placeholders: leftover.join(", "),
        });
    }

    Ok(query)
}

/// Resolve the window for a `DateRange` stream
///
/// The window starts at the later of the bookmark's date and the configured
/// start date, and ends one day after `now` so records stamped just past
/// midnight in the API's timezone are not missed. Returns `None` when no
/// start is known.
pub fn resolve_date_window(
    bookmark: Option<&DateTime<Utc>>,
    start_date: Option<&DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateWindow> {
    let from = match (bookmark, start_date) {
        (Some(b), Some(s)) => b.date_naive().max(s.date_naive()),
        (Some(b), None) => b.date_naive(),
        (None, Some(s)) => s.date_naive(),
        (None, None) => return None,
    };
    let to = now.date_naive().checked_add_days(Days::new(1))?;
    Some(DateWindow::new(from, to))
}

/// Resolve the lower bound for an `IncrementalTimestamp` stream
///
/// The bookmark wins when present; otherwise the configured start date.
pub fn resolve_starting_timestamp(
    bookmark: Option<&DateTime<Utc>>,
    start_date: Option<&DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    bookmark.or(start_date).copied()
}

/// Parse a bookmark or config timestamp
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) and
/// bare `YYYY-MM-DD` dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way `$updated_from` expects it
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Format a date the way `$date_from`/`$date_to` expect it
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Recognized placeholders still present in `text`
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Quote a scalar as a GraphQL string literal
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
