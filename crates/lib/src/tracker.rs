//! # Batch Job Tracker
//!
//! Owns the lifecycle of batch submissions:
//!
//! 1.  **Submit**: write the request file, upload it, create the batch (with a
//!     bounded retry on rate limiting) and persist an in-progress record.
//! 2.  **Poll**: ask the provider for the status of every in-progress record
//!     and move the completed ones to the completed stage, exactly once.
//! 3.  **Finalize**: download the results of a completed batch, keep a copy,
//!     and parse it line by line into triples.
//!
//! A record goes `created -> {validating, in_progress, finalizing, parsing}* ->
//! completed`. Statuses the tracker does not know are logged and left alone;
//! there is no failure stage and no timeout.

use crate::config::TrackerSettings;
use crate::constants::REQUEST_PREFIX;
use crate::errors::ProviderError;
use crate::prompter::PrompterParser;
use crate::providers::batch::{BatchProvider, BatchSpec};
use crate::store::{JobStore, Stage, StoreError};
use crate::types::{BatchStatus, JobRecord, Triple};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to create batch after {attempts} attempts")]
    SubmissionExhausted { attempts: u32 },
    #[error("Index {0} is already used by another job record")]
    IndexTaken(u32),
    #[error("Nothing to submit for '{0}'")]
    EmptySubmission(String),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Snapshot of the job store, for reporting.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub in_progress: Vec<JobRecord>,
    pub completed: Vec<JobRecord>,
}

pub struct BatchTracker<'a> {
    provider: &'a dyn BatchProvider,
    store: &'a dyn JobStore,
    settings: TrackerSettings,
}

impl<'a> BatchTracker<'a> {
    pub fn new(
        provider: &'a dyn BatchProvider,
        store: &'a dyn JobStore,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store
    }

    /// Submits `work_items` as one batch and records it under `source_index`.
    pub async fn submit(
        &self,
        work_items: &[Value],
        source_index: u32,
        source_name: &str,
    ) -> Result<JobRecord, TrackerError> {
        if work_items.is_empty() {
            return Err(TrackerError::EmptySubmission(source_name.to_string()));
        }
        if self.is_index_taken(source_index)? {
            return Err(TrackerError::IndexTaken(source_index));
        }

        let mut payload = Vec::new();
        for item in work_items {
            serde_json::to_writer(&mut payload, item)?;
            payload.push(b'\n');
        }
        self.store.write_request(source_index, &payload)?;

        let file_name = format!("{REQUEST_PREFIX}{source_index}.jsonl");
        let input_file_id = self.provider.upload_requests(&file_name, payload).await?;
        let batch_id = self.create_with_retry(&input_file_id).await?;
        info!("Batch file created successfully. Batch ID: `{batch_id}`.");

        let record = JobRecord::new(batch_id, source_index, source_name);
        self.store.write(Stage::InProgress, source_index, &record)?;
        self.store.append_mapping(source_name, source_index)?;
        info!(
            "Batch `{}` for '{}' recorded as in-progress index {}.",
            record.batch_id, source_name, source_index
        );
        Ok(record)
    }

    fn is_index_taken(&self, index: u32) -> Result<bool, TrackerError> {
        Ok(self.store.list(Stage::InProgress)?.contains(&index)
            || self.store.list(Stage::Completed)?.contains(&index))
    }

    async fn create_with_retry(&self, input_file_id: &str) -> Result<String, TrackerError> {
        let spec = BatchSpec {
            endpoint: self.settings.endpoint.clone(),
            completion_window: self.settings.completion_window.clone(),
            description: self.settings.job_description.clone(),
        };
        let attempts = self.settings.max_attempts;
        for attempt in 1..=attempts {
            match self.provider.create_batch(input_file_id, &spec).await {
                Ok(batch_id) => return Ok(batch_id),
                Err(e) if e.is_rate_limited() => {
                    error!("Rate limit error (attempt {attempt}/{attempts}): {e}");
                    if attempt < attempts {
                        info!(
                            "Waiting for {} seconds before retrying.",
                            self.settings.retry_backoff.as_secs()
                        );
                        tokio::time::sleep(self.settings.retry_backoff).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TrackerError::SubmissionExhausted { attempts })
    }

    /// Checks every in-progress record and moves the completed ones.
    ///
    /// Returns the records that moved during this call; an empty list means
    /// nothing changed state.
    pub async fn poll(&self) -> Result<Vec<JobRecord>, TrackerError> {
        let mut newly_completed = Vec::new();

        for index in self.store.list(Stage::InProgress)? {
            let mut record = self.store.read(Stage::InProgress, index)?;
            let status = match self.provider.get_status(&record.batch_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        "Could not fetch status of batch {} (index {index}): {e}",
                        record.batch_id
                    );
                    continue;
                }
            };
            info!(
                "Current status of batch {} in {}: {status}",
                record.batch_id,
                Stage::InProgress.file_name(index)
            );

            match status {
                BatchStatus::Completed => {
                    // The in-progress copy keeps its old status until the move succeeds.
                    if let Err(e) = self
                        .store
                        .move_record(index, Stage::InProgress, Stage::Completed)
                    {
                        error!(
                            "Could not move batch {} (index {index}) to the completed stage: {e}",
                            record.batch_id
                        );
                        continue;
                    }
                    record.status = BatchStatus::Completed;
                    self.store.write(Stage::Completed, index, &record)?;
                    newly_completed.push(record);
                }
                status if status.is_in_flight() => {
                    info!("Batch {} is still in progress.", record.batch_id);
                    if record.status != status {
                        record.status = status;
                        self.store.write(Stage::InProgress, index, &record)?;
                    }
                }
                other => {
                    warn!(
                        "Unexpected status {other} for batch {} in {}.",
                        record.batch_id,
                        Stage::InProgress.file_name(index)
                    );
                }
            }
        }

        Ok(newly_completed)
    }

    /// Downloads and parses the output of a completed batch.
    ///
    /// Lines that fail to parse are logged with their line number and
    /// skipped; they never abort the batch.
    pub async fn finalize(
        &self,
        record: &JobRecord,
        parser: &dyn PrompterParser,
    ) -> Result<Vec<Triple>, TrackerError> {
        info!(
            "Processing a newly completed batch: `{}`. Downloading results.",
            record.batch_id
        );
        let blob = self.provider.fetch_result(&record.batch_id).await?;
        self.store.write_results(record.source_index, &blob)?;

        let stored = self.store.read_results(record.source_index)?;
        let content = String::from_utf8_lossy(&stored);

        let mut triples = Vec::new();
        for (line_number, line) in content.lines().enumerate() {
            let line_number = line_number + 1;
            if line.trim().is_empty() {
                continue;
            }
            match parser.parse_response(line) {
                Ok(parsed) => triples.extend(parsed),
                Err(e) => error!(
                    "Failed to parse line {line_number} of batch {}: {e} | {}",
                    record.batch_id,
                    line.trim()
                ),
            }
        }

        info!(
            "Found {} raw triples in the batch results.",
            triples.len()
        );
        Ok(triples)
    }
}

/// Reads the job store without a provider, for `status` runs.
pub fn status_report(store: &dyn JobStore) -> Result<StatusReport, TrackerError> {
    let mut report = StatusReport::default();
    for index in store.list(Stage::InProgress)? {
        report.in_progress.push(store.read(Stage::InProgress, index)?);
    }
    for index in store.list(Stage::Completed)? {
        report.completed.push(store.read(Stage::Completed, index)?);
    }
    Ok(report)
}
