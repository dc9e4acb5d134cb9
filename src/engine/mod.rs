//! Execution engine module
//!
//! The stream pagination driver.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - runs one stream (or one child stream per parent) to
//!   completion, page by page
//!
//! Parent ids seen by a parent stream are recorded as pending on the child
//! stream before every checkpoint that moves the parent's bookmark, so a
//! child run that fails or never starts is replayed on the next run.
//! - `SyncConfig` - configuration for sync operations
//! - Message types for output (Record, State, Log)
//!
//! Each page goes render → send under the retry policy → paginate →
//! extract. The next page's parameters are derived from the previous
//! page's `pageInfo` and never mutated by the components that read them.

mod types;

pub use types::{Message, StreamRun, SyncConfig, SyncStats};

use crate::catalog::{PaginationMode, StreamDefinition};
use crate::decode::ResponseExtractor;
use crate::error::{Error, Result};
use crate::http::{RetryPolicy, Transport};
use crate::pagination::{GraphQlPaginator, NextPage, PaginationParameters};
use crate::partition::{extract_json_path, ParentContext, ParentRouter};
use crate::queries::TemplateProvider;
use crate::state::StateManager;
use crate::template;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// GraphQL transport
    transport: Arc<dyn Transport>,
    /// Query template source
    templates: Arc<dyn TemplateProvider>,
    /// Retry policy wrapped around every send
    retry: RetryPolicy,
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
    /// Fixed clock, when set
    now: Option<DateTime<Utc>>,
}

impl SyncEngine {
    /// Create a new sync engine with the default retry policy
    pub fn new(
        transport: Arc<dyn Transport>,
        templates: Arc<dyn TemplateProvider>,
        state: StateManager,
    ) -> Self {
        Self {
            transport,
            templates,
            retry: RetryPolicy::default(),
            state,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
            now: None,
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pin "now" for date windows and extraction timestamps
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Parameters for the first page of a stream run
    ///
    /// Binds whatever the stream's mode needs from state and config. A value
    /// that cannot be resolved is left unbound; rendering reports it.
    pub async fn initial_parameters(
        &self,
        stream: &StreamDefinition,
        parent_id: Option<&str>,
    ) -> PaginationParameters {
        let params = PaginationParameters::new();
        let start_date = self.config.start_date.as_ref();

        match &stream.pagination {
            PaginationMode::CursorOnly => params,
            PaginationMode::IncrementalTimestamp => {
                let bookmark = self.state.bookmark_timestamp(&stream.name).await;
                match template::resolve_starting_timestamp(bookmark.as_ref(), start_date) {
                    Some(ts) => {
                        debug!("{}: replicating from {}", stream.name, ts);
                        params.with_starting_timestamp(ts)
                    }
                    None => params,
                }
            }
            PaginationMode::DateRange => {
                let bookmark = self.state.bookmark_timestamp(&stream.name).await;
                match template::resolve_date_window(bookmark.as_ref(), start_date, self.now()) {
                    Some(window) => {
                        info!(
                            "{}: querying from {} to {}",
                            stream.name, window.from, window.to
                        );
                        params.with_date_window(window)
                    }
                    None => params,
                }
            }
            PaginationMode::ChildContext { .. } => match parent_id {
                Some(id) => params.with_parent_id(id),
                None => params,
            },
        }
    }

    /// Sync a single stream run to exhaustion
    ///
    /// `parent_id` binds `$order_id` for child streams and is ignored
    /// otherwise. Every record and checkpoint goes to `on_message` in
    /// order; an error returned from it aborts the run.
    pub async fn sync_stream<F>(
        &mut self,
        stream: &StreamDefinition,
        parent_id: Option<&str>,
        on_message: &mut F,
    ) -> Result<StreamRun>
    where
        F: FnMut(Message) -> Result<()>,
    {
        self.run_stream(stream, parent_id, &mut [], on_message).await
    }

    /// Sync a parent stream, feeding every record to `routers`
    ///
    /// Ids each router collects are recorded as pending parents of its child
    /// stream before each checkpoint.
    pub async fn sync_parent_stream<F>(
        &mut self,
        stream: &StreamDefinition,
        routers: &mut [ParentRouter],
        on_message: &mut F,
    ) -> Result<StreamRun>
    where
        F: FnMut(Message) -> Result<()>,
    {
        self.run_stream(stream, None, routers, on_message).await
    }

    async fn run_stream<F>(
        &mut self,
        stream: &StreamDefinition,
        parent_id: Option<&str>,
        routers: &mut [ParentRouter],
        on_message: &mut F,
    ) -> Result<StreamRun>
    where
        F: FnMut(Message) -> Result<()>,
    {
        let start = Instant::now();
        let template_text = self.templates.template(stream.template_name())?;
        let key = stream.envelope_key();
        let paginator = GraphQlPaginator::new(key);
        let extractor = ResponseExtractor::new(key);

        let mut params = self.initial_parameters(stream, parent_id).await;
        let mut run = StreamRun::default();

        info!("Starting sync for stream: {}", stream.name);

        loop {
            // Configuration problems surface here, before anything is sent
            let query = template::render(&template_text, stream, &params)?;

            let page = self
                .retry
                .execute(self.transport.as_ref(), &query, &extractor)
                .await?;
            let extracted_at = self.now();

            run.pages += 1;
            self.stats.add_page();

            let next = paginator.next_page(page.envelope());
            let mut records = extractor.extract(page)?;
            let mut page_records = 0;
            for record in records.by_ref() {
                if let Some(replication_key) = &stream.replication_key {
                    if let Some(value) = extract_json_path(&record, replication_key) {
                        self.state
                            .advance_bookmark(&stream.name, replication_key, value)
                            .await;
                    }
                }
                for router in routers.iter_mut() {
                    router.observe(&record);
                }
                on_message(Message::record(&stream.name, record, extracted_at))?;
                page_records += 1;
            }

            run.records += page_records;
            self.stats.add_records(page_records);
            debug!(
                "{}: page {} fetched {page_records} records ({} edges skipped)",
                stream.name,
                run.pages,
                records.skipped()
            );

            match next {
                NextPage::Continue { cursor } => {
                    if self.config.emit_state_per_page {
                        self.record_pending_parents(routers).await;
                        self.emit_state(on_message).await?;
                    }
                    params = params.after(cursor);
                }
                NextPage::Done => break,
            }
        }

        self.record_pending_parents(routers).await;
        self.emit_state(on_message).await?;

        self.stats.add_stream();
        #[allow(clippy::cast_possible_truncation)]
        self.stats
            .set_duration(self.stats.duration_ms + start.elapsed().as_millis() as u64);

        info!(
            "Completed sync for {}: {} records in {} pages",
            stream.name, run.records, run.pages
        );

        Ok(run)
    }

    /// Sync a child stream once per parent context
    ///
    /// `parents` runs first, then any parents still pending from an earlier
    /// run. Parents already recorded as complete are skipped, so an
    /// interrupted run resumes where it stopped. Each parent run gets a
    /// fresh cursor. The parent bookkeeping is cleared only once every
    /// parent has succeeded; otherwise it is kept for the next run and
    /// [`Error::ParentsFailed`] is returned.
    pub async fn sync_child_stream<F>(
        &mut self,
        stream: &StreamDefinition,
        parents: &[ParentContext],
        on_message: &mut F,
    ) -> Result<StreamRun>
    where
        F: FnMut(Message) -> Result<()>,
    {
        let mut total = StreamRun::default();
        let queue = self.parent_queue(stream, parents).await?;
        let mut failed = 0;

        info!(
            "Starting sync for child stream {} over {} parents",
            stream.name,
            queue.len()
        );

        for parent in &queue {
            if self
                .state
                .is_parent_completed(&stream.name, &parent.id)
                .await
            {
                debug!("{}: skipping completed parent {}", stream.name, parent.id);
                self.stats.parents_skipped += 1;
                continue;
            }

            match self.sync_stream(stream, Some(&parent.id), on_message).await {
                Ok(run) => {
                    total.pages += run.pages;
                    total.records += run.records;
                    self.state
                        .mark_parent_completed(&stream.name, &parent.id)
                        .await;
                    self.emit_state(on_message).await?;
                    self.stats.parents_synced += 1;
                }
                Err(e) => {
                    self.stats.add_error();
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    failed += 1;
                    warn!("{}: parent {} failed: {e}", stream.name, parent.id);
                    on_message(Message::error(format!(
                        "Error syncing {} for parent {}: {e}",
                        stream.name, parent.id
                    )))?;
                }
            }
        }

        if failed > 0 {
            // Completed and pending parents stay so the next run retries
            // only the failed ones
            self.emit_state(on_message).await?;
            return Err(Error::ParentsFailed {
                stream: stream.name.clone(),
                failed,
                total: queue.len(),
            });
        }

        self.state.clear_parents(&stream.name).await;
        self.emit_state(on_message).await?;

        info!(
            "Completed child sync for {}: {} records across {} parents",
            stream.name, total.records, self.stats.parents_synced
        );

        Ok(total)
    }

    /// `parents` followed by pending parents left over from earlier runs
    ///
    /// Every queued parent is recorded as pending and persisted before the
    /// first child query.
    async fn parent_queue(
        &self,
        stream: &StreamDefinition,
        parents: &[ParentContext],
    ) -> Result<Vec<ParentContext>> {
        let parent_stream = stream.parent_stream().unwrap_or_default();
        let pending = self.state.pending_parents(&stream.name).await;

        let mut queue = parents.to_vec();
        let mut seen: HashSet<String> = parents.iter().map(|p| p.id.clone()).collect();
        let before = queue.len();
        for id in pending {
            if seen.insert(id.clone()) {
                queue.push(ParentContext::new(parent_stream, id));
            }
        }
        if queue.len() > before {
            info!(
                "{}: resuming {} parents left from an earlier run",
                stream.name,
                queue.len() - before
            );
        }

        let added = self
            .state
            .add_pending_parents(&stream.name, queue.iter().map(|p| p.id.as_str()))
            .await;
        if added > 0 {
            self.state.checkpoint().await?;
        }
        Ok(queue)
    }

    /// Record ids the routers collected as pending on their child streams
    async fn record_pending_parents(&self, routers: &mut [ParentRouter]) {
        for router in routers.iter_mut() {
            let Some(child) = router.child_stream().map(str::to_string) else {
                continue;
            };
            let added = self
                .state
                .add_pending_parents(&child, router.take_new().iter().map(|p| p.id.as_str()))
                .await;
            if added > 0 {
                debug!("{child}: {added} parents pending");
            }
        }
    }

    /// Persist state and hand a copy to the caller
    async fn emit_state<F>(&self, on_message: &mut F) -> Result<()>
    where
        F: FnMut(Message) -> Result<()>,
    {
        self.state.checkpoint().await?;
        let value = serde_json::to_value(self.state.snapshot().await)?;
        on_message(Message::state(value))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("retry", &self.retry)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
