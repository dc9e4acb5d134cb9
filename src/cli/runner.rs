//! CLI runner - executes commands

use crate::auth::Authenticator;
use crate::catalog::{builtin_catalog, load_catalog, Catalog, PaginationMode, StreamDefinition};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::decode::ResponseExtractor;
use crate::engine::{Message, SyncConfig, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::http::{GraphQlClient, RetryPolicy};
use crate::pagination::PaginationParameters;
use crate::partition::ParentRouter;
use crate::queries::{DirectoryTemplates, EmbeddedTemplates, TemplateProvider};
use crate::state::StateManager;
use crate::template;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Read {
                streams,
                continue_on_error,
            } => self.read(streams.as_deref(), *continue_on_error).await,
            Commands::Streams => self.streams(),
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<TapConfig> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            return TapConfig::from_json(json_str);
        }

        match &self.cli.config {
            Some(path) => TapConfig::from_file(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Load the stream catalog
    fn load_catalog(&self) -> Result<Catalog> {
        match &self.cli.catalog {
            Some(path) => load_catalog(path),
            None => builtin_catalog(),
        }
    }

    /// Query template source
    fn template_provider(&self) -> Arc<dyn TemplateProvider> {
        match &self.cli.templates {
            Some(dir) => Arc::new(DirectoryTemplates::new(dir)),
            None => Arc::new(EmbeddedTemplates),
        }
    }

    /// Exchange the refresh token and build the GraphQL client
    async fn connect(config: &TapConfig) -> Result<GraphQlClient> {
        let authenticator = Authenticator::new(config.auth_config())?;
        let token = authenticator.access_token().await?;
        GraphQlClient::new(config.http_client_config(), token)
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let catalog = self.load_catalog()?;
        let templates = self.template_provider();

        info!("Checking connection to {}", config.api_url);

        match Self::probe(&config, &catalog, templates.as_ref()).await {
            Ok(stream) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "SUCCEEDED",
                    "message": format!("Fetched one page of '{stream}'")
                }
            })),
            Err(e) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "FAILED",
                    "message": format!("Connection failed: {e}")
                }
            })),
        }
    }

    /// Fetch the first page of the first stream that needs no parameters
    async fn probe(
        config: &TapConfig,
        catalog: &Catalog,
        templates: &dyn TemplateProvider,
    ) -> Result<String> {
        let stream = catalog
            .streams
            .iter()
            .find(|s| s.pagination == PaginationMode::CursorOnly)
            .ok_or_else(|| Error::config("Catalog has no cursor-only stream to probe"))?;

        let client = Self::connect(config).await?;
        let query = template::render(
            &templates.template(stream.template_name())?,
            stream,
            &PaginationParameters::new(),
        )?;
        let extractor = ResponseExtractor::new(stream.envelope_key());
        RetryPolicy::new(config.retry_config())
            .execute(&client, &query, &extractor)
            .await?;

        Ok(stream.name.clone())
    }

    /// Discover streams
    fn discover(&self) -> Result<()> {
        let catalog = self.load_catalog()?;

        let streams: Vec<Value> = catalog
            .streams
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "primary_key": s.primary_key,
                    "replication_key": s.replication_key,
                    "supported_sync_modes": s.supported_sync_modes(),
                    "pagination": s.pagination,
                    "envelope_key": s.envelope_key(),
                    "parent_stream": s.parent_stream(),
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "CATALOG",
            "catalog": {
                "source": catalog.name,
                "streams": streams
            }
        }))
    }

    /// List available streams
    fn streams(&self) -> Result<()> {
        let catalog = self.load_catalog()?;
        self.output_message(&json!({
            "type": "STREAMS",
            "streams": catalog.names(),
            "source": catalog.name
        }))
    }

    /// Read data
    async fn read(&self, streams: Option<&str>, continue_on_error: bool) -> Result<()> {
        let sync_start = Instant::now();
        let config = self.load_config()?;
        let catalog = self.load_catalog()?;
        let selected = select_streams(&catalog, streams)?;
        let state = self.load_state()?;
        let templates = self.template_provider();

        // Auth failures end the run before any stream starts
        let client = Self::connect(&config).await?;

        let sync_config = SyncConfig::new()
            .with_start_date(config.start_date_timestamp())
            .with_state_per_page(config.page_checkpoint)
            .with_fail_fast(!continue_on_error);

        let mut engine = SyncEngine::new(Arc::new(client), templates, state)
            .with_retry_policy(RetryPolicy::new(config.retry_config()))
            .with_config(sync_config);

        let format = self.cli.format;
        let mut stream_results: Vec<Value> = Vec::new();
        let mut failed: Vec<&str> = Vec::new();

        for stream in selected.iter().filter(|s| s.parent_stream().is_none()) {
            let children: Vec<&StreamDefinition> = selected
                .iter()
                .copied()
                .filter(|c| c.parent_stream() == Some(stream.name.as_str()))
                .collect();

            // Only collect parent ids when a selected child needs them
            let mut routers: Vec<ParentRouter> = children
                .iter()
                .filter_map(|child| ParentRouter::for_child(child))
                .collect();

            let stream_start = Instant::now();
            let result = engine
                .sync_parent_stream(stream, &mut routers, &mut |msg: Message| emit(format, &msg))
                .await;

            let parent_ok = result.is_ok();
            stream_results.push(stream_result(&stream.name, result, stream_start));
            if !parent_ok {
                failed.push(&stream.name);
                if !continue_on_error {
                    break;
                }
            }

            for (child, router) in children.into_iter().zip(routers) {
                if !parent_ok {
                    error!("Skipping {}: parent stream {} failed", child.name, stream.name);
                    failed.push(&child.name);
                    continue;
                }

                let child_start = Instant::now();
                let result = engine
                    .sync_child_stream(child, router.contexts(), &mut |msg: Message| {
                        emit(format, &msg)
                    })
                    .await;
                let child_ok = result.is_ok();
                stream_results.push(stream_result(&child.name, result, child_start));
                if !child_ok {
                    failed.push(&child.name);
                    if !continue_on_error {
                        break;
                    }
                }
            }

            if !failed.is_empty() && !continue_on_error {
                break;
            }
        }

        let stats = engine.stats();
        self.output_message(&json!({
            "type": "SYNC_SUMMARY",
            "summary": {
                "status": if failed.is_empty() { "SUCCEEDED" } else { "FAILED" },
                "total_records": stats.records_synced,
                "total_pages": stats.pages_fetched,
                "parents_synced": stats.parents_synced,
                "duration_ms": sync_start.elapsed().as_millis() as u64,
                "state_file": self.cli.state.as_ref().map(|p| p.display().to_string()),
                "streams": stream_results
            }
        }))?;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Other(format!("Sync failed for: {}", failed.join(", "))))
        }
    }

    /// Print a non-engine message
    fn output_message(&self, msg: &Value) -> Result<()> {
        let line = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(msg)?,
        };
        writeln!(std::io::stdout(), "{line}").context("Failed to write to stdout")
    }
}

/// Print one engine message to stdout
fn emit(format: OutputFormat, msg: &Message) -> Result<()> {
    let line = match format {
        OutputFormat::Json => msg.to_json_line()?,
        OutputFormat::Pretty => serde_json::to_string_pretty(msg)?,
    };
    writeln!(std::io::stdout(), "{line}").context("Failed to write to stdout")
}

/// Summary entry for one stream
fn stream_result<T>(name: &str, result: Result<T>, started: Instant) -> Value {
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => json!({
            "stream": name,
            "status": "SUCCESS",
            "duration_ms": duration_ms
        }),
        Err(e) => {
            error!("Error syncing stream {name}: {e}");
            json!({
                "stream": name,
                "status": "FAILED",
                "error": e.to_string(),
                "duration_ms": duration_ms
            })
        }
    }
}

/// Resolve a comma-separated selection against the catalog
///
/// Streams come back in catalog order. An empty selection means every
/// stream. A child stream needs its parent in the same run, since parent
/// ids only come from the parent's records.
pub fn select_streams<'a>(
    catalog: &'a Catalog,
    filter: Option<&str>,
) -> Result<Vec<&'a StreamDefinition>> {
    let names: Vec<&str> = filter
        .map(|f| {
            f.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        return Ok(catalog.streams.iter().collect());
    }

    for name in &names {
        if catalog.get(name).is_none() {
            return Err(Error::StreamNotFound {
                stream: (*name).to_string(),
            });
        }
    }

    let selected: Vec<&StreamDefinition> = catalog
        .streams
        .iter()
        .filter(|s| names.contains(&s.name.as_str()))
        .collect();

    for stream in &selected {
        if let Some(parent) = stream.parent_stream() {
            if !names.contains(&parent) {
                return Err(Error::config(format!(
                    "Stream '{}' needs its parent stream '{parent}' selected as well",
                    stream.name
                )));
            }
        }
    }

    Ok(selected)
}
