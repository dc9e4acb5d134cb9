//! Query templates embedded in the binary
//!
//! Every built-in stream has a `queries/<name>.graphql` file. Lookup goes
//! through [`TemplateProvider`] so the request engine never touches the
//! filesystem directly.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Built-in query templates keyed by stream name
pub static BUILTIN_QUERIES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Incremental by update time
    m.insert("orders", include_str!("../queries/orders.graphql"));
    m.insert("products", include_str!("../queries/products.graphql"));
    m.insert("returns", include_str!("../queries/returns.graphql"));

    // Full table
    m.insert("vendors", include_str!("../queries/vendors.graphql"));
    m.insert(
        "purchase_orders",
        include_str!("../queries/purchase_orders.graphql"),
    );

    // Date windows
    m.insert("shipments", include_str!("../queries/shipments.graphql"));
    m.insert(
        "line_item_pick",
        include_str!("../queries/line_item_pick.graphql"),
    );

    // Children of orders
    m.insert(
        "order_history",
        include_str!("../queries/order_history.graphql"),
    );

    m
});

/// Source of raw query template text, addressed by template name
pub trait TemplateProvider: Send + Sync {
    /// Return the template text for `name`
    fn template(&self, name: &str) -> Result<String>;
}

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl TemplateProvider for EmbeddedTemplates {
    fn template(&self, name: &str) -> Result<String> {
        BUILTIN_QUERIES
            .get(name)
            .map(|t| (*t).to_string())
            .ok_or_else(|| Error::TemplateNotFound {
                stream: name.to_string(),
            })
    }
}

/// Templates read from `<dir>/<name>.graphql`
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    /// Create a provider rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateProvider for DirectoryTemplates {
    fn template(&self, name: &str) -> Result<String> {
        let path = self.dir.join(format!("{name}.graphql"));
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::TemplateNotFound {
                    stream: name.to_string(),
                }
            } else {
                Error::template(format!("Failed to read '{}': {e}", path.display()))
            }
        })
    }
}

/// Templates held in memory, mostly for tests and embedding callers
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(name.into(), text.into());
        self
    }
}

impl TemplateProvider for StaticTemplates {
    fn template(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound {
                stream: name.to_string(),
            })
    }
}

/// List built-in template names
pub fn list_builtin() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_QUERIES.keys().copied().collect();
    names.sort_unstable();
    names
}
