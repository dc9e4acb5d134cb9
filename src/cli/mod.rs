//! CLI module
//!
//! Command-line interface for running the source.
//!
//! # Commands
//!
//! - `check` - Exchange the refresh token and fetch one page
//! - `discover` - Print the stream catalog
//! - `read` - Extract data from streams
//! - `streams` - List stream names (lightweight)

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{select_streams, Runner};
