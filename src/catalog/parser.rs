//! YAML parser for stream catalogs
//!
//! Parses and validates catalog YAML files.
//! Supports the built-in catalog (by name) and custom YAML files (by path).

use crate::catalog::types::{Catalog, PaginationMode, StreamDefinition};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Built-in ShipHero catalog
const BUILTIN_CATALOG: &str = include_str!("../../connectors/shiphero.yaml");

/// Load the built-in catalog
pub fn builtin_catalog() -> Result<Catalog> {
    load_catalog_from_str(BUILTIN_CATALOG)
}

/// Load a catalog definition from a file path
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read catalog file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_catalog_from_str(&content)
}

/// Load a catalog definition from a YAML string
pub fn load_catalog_from_str(yaml: &str) -> Result<Catalog> {
    let catalog: Catalog = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse catalog YAML: {e}")))?;

    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Validate a catalog
fn validate_catalog(catalog: &Catalog) -> Result<()> {
    if catalog.streams.is_empty() {
        return Err(Error::config("Catalog must have at least one stream"));
    }

    let stream_names: HashSet<_> = catalog.streams.iter().map(|s| s.name.as_str()).collect();
    if stream_names.len() != catalog.streams.len() {
        return Err(Error::config("Duplicate stream names found"));
    }

    for stream in &catalog.streams {
        validate_stream(stream, &stream_names)?;
    }

    Ok(())
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition, known: &HashSet<&str>) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.envelope_key.as_deref().is_some_and(str::is_empty) {
        return Err(Error::config(format!(
            "Stream '{}' envelope_key cannot be empty",
            stream.name
        )));
    }

    match &stream.pagination {
        PaginationMode::IncrementalTimestamp if stream.replication_key.is_none() => {
            Err(Error::config(format!(
                "Stream '{}' uses incremental_timestamp but declares no replication_key",
                stream.name
            )))
        }
        PaginationMode::ChildContext { parent_stream, .. } => {
            if parent_stream == &stream.name {
                return Err(Error::config(format!(
                    "Stream '{}' cannot be its own parent",
                    stream.name
                )));
            }
            if !known.contains(parent_stream.as_str()) {
                return Err(Error::config(format!(
                    "Stream '{}' references unknown parent stream '{parent_stream}'",
                    stream.name
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
