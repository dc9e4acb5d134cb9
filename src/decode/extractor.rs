//! Record extraction from connection envelopes

use super::types::PageResponse;
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::warn;

/// Unwraps `data.<stream_key>.data.edges[].node` into records
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    stream_key: String,
}

impl ResponseExtractor {
    /// Create an extractor for the given envelope key
    pub fn new(stream_key: impl Into<String>) -> Self {
        Self {
            stream_key: stream_key.into(),
        }
    }

    /// Envelope key this extractor reads
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Parse a raw body and extract its records
    pub fn extract_records(&self, body: &str) -> Result<Records> {
        self.extract(PageResponse::parse(body)?)
    }

    /// Fail when the connection is absent and the API reported errors
    ///
    /// An absent connection without errors is an empty page, not a failure.
    pub fn check(&self, page: &PageResponse) -> Result<()> {
        if page.connection(&self.stream_key).is_none() && page.has_errors() {
            return Err(Error::graphql(page.error_messages()));
        }
        Ok(())
    }

    /// Extract the records of a parsed page
    pub fn extract(&self, page: PageResponse) -> Result<Records> {
        self.check(&page)?;

        let mut envelope = page.into_envelope();
        let edges = envelope
            .pointer_mut(&format!("/data/{}/data/edges", escape_pointer(&self.stream_key)))
            .map(Value::take);

        let edges = match edges {
            Some(Value::Array(edges)) => edges,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                warn!(
                    "{}: edges is not a list ({}), treating page as empty",
                    self.stream_key,
                    type_name(&other)
                );
                Vec::new()
            }
        };

        Ok(Records {
            stream_key: self.stream_key.clone(),
            edges: edges.into_iter().enumerate(),
            skipped: 0,
        })
    }
}

/// Lazy, single-pass sequence of one page's records
#[derive(Debug)]
pub struct Records {
    stream_key: String,
    edges: std::iter::Enumerate<std::vec::IntoIter<Value>>,
    skipped: usize,
}

impl Records {
    /// Edges skipped so far for lacking a `node`
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Records {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        for (index, edge) in self.edges.by_ref() {
            let node = match edge {
                Value::Object(mut map) => map.remove("node"),
                _ => None,
            };
            match node {
                Some(node) if !node.is_null() => return Some(node),
                _ => {
                    self.skipped += 1;
                    warn!("{}: edge {index} has no node, skipping", self.stream_key);
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.edges.size_hint().1)
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
