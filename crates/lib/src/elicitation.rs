//! # Elicitation Orchestrator
//!
//! Runs one batch per template file. A `submit` run renders every template
//! against the selected subjects and hands each result to the tracker; a
//! later `verify` run polls the tracker and turns every completed batch into a
//! `wikidata_triples_<index>.csv` file. Nothing blocks waiting for the
//! provider: operators re-run `verify` until every batch has landed.

use crate::prompter::{JsonSchemaPrompter, PrompterParser, TemplateError};
use crate::store::{Stage, StoreError};
use crate::subjects::SubjectCatalog;
use crate::tracker::{BatchTracker, TrackerError};
use crate::triples_csv::{triples_file_name, write_triples_csv, TriplesFileError};
use crate::types::JobRecord;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ElicitError {
    #[error("Template directory '{0}' does not exist")]
    MissingTemplateDir(PathBuf),
    #[error("No template files found in '{0}'")]
    NoTemplates(PathBuf),
    #[error("No subjects selected for elicitation")]
    NoSubjects,
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
    #[error("Triples file error: {0}")]
    Triples(#[from] TriplesFileError),
}

/// What an elicitation run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitationMode {
    /// Submit one new batch per template.
    Submit,
    /// Collect the batches that have completed since the last run.
    Verify,
    /// Report the contents of the job store without contacting anyone.
    Status,
}

/// One CSV written by a verify run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedBatch {
    pub record: JobRecord,
    pub triples_path: PathBuf,
    pub triple_count: usize,
}

/// A completed batch a verify run could not turn into a CSV. It stays in the
/// completed stage and is retried by the next verify run.
#[derive(Debug)]
pub struct UncollectedBatch {
    pub record: JobRecord,
    pub error: ElicitError,
}

/// Everything a verify run did.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub collected: Vec<CollectedBatch>,
    pub failed: Vec<UncollectedBatch>,
}

pub struct Elicitor<'a> {
    tracker: BatchTracker<'a>,
    model: String,
    template_dir: PathBuf,
    triples_dir: PathBuf,
}

impl<'a> Elicitor<'a> {
    pub fn new(
        tracker: BatchTracker<'a>,
        model: &str,
        template_dir: impl Into<PathBuf>,
        triples_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tracker,
            model: model.to_string(),
            template_dir: template_dir.into(),
            triples_dir: triples_dir.into(),
        }
    }

    /// Submits one batch per template in the template directory.
    ///
    /// Subjects are drawn once and shared by every template. `sample` of
    /// `None` sends the full catalog.
    pub async fn submit<R: Rng + ?Sized>(
        &self,
        catalog: &SubjectCatalog,
        sample: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<JobRecord>, ElicitError> {
        let templates = self.template_files()?;
        let subjects = catalog.select(sample, rng);
        if subjects.is_empty() {
            return Err(ElicitError::NoSubjects);
        }
        info!(
            "Submitting {} templates for {} subjects.",
            templates.len(),
            subjects.len()
        );

        fs::create_dir_all(&self.triples_dir).map_err(|source| ElicitError::Io {
            path: self.triples_dir.clone(),
            source,
        })?;

        let mut records = Vec::with_capacity(templates.len());
        for path in templates {
            let prompter = JsonSchemaPrompter::from_file(&path, &self.model)?;
            let requests = subjects
                .iter()
                .map(|subject| prompter.build_request(subject))
                .collect::<Result<Vec<_>, _>>()?;

            let index = self.tracker.store().next_index()?;
            let record = self
                .tracker
                .submit(&requests, index, prompter.source_name())
                .await?;
            records.push(record);
        }
        Ok(records)
    }

    /// Collects completed batches into CSV files.
    ///
    /// Collects the batches this poll moved and any completed batch whose CSV
    /// is still missing. With `reprocess_all`, every record in the completed
    /// stage is collected again; re-collecting overwrites the CSV with the
    /// same content. A batch that fails is reported in
    /// [`VerifyReport::failed`] and does not stop the others.
    pub async fn verify(&self, reprocess_all: bool) -> Result<VerifyReport, ElicitError> {
        let newly_completed: Vec<u32> = self
            .tracker
            .poll()
            .await?
            .iter()
            .map(|record| record.source_index)
            .collect();
        if newly_completed.is_empty() {
            info!("No batch completed since the last check.");
        }

        let store = self.tracker.store();
        let mut report = VerifyReport::default();
        for index in store.list(Stage::Completed)? {
            let triples_path = self.triples_dir.join(triples_file_name(index));
            let pending = newly_completed.contains(&index) || !triples_path.exists();
            if !reprocess_all && !pending {
                continue;
            }
            let record = store.read(Stage::Completed, index)?;
            match self.collect(&record, &triples_path).await {
                Ok(triple_count) => report.collected.push(CollectedBatch {
                    record,
                    triples_path,
                    triple_count,
                }),
                Err(e) => {
                    error!(
                        "Failed to collect batch {} (index {index}): {e}",
                        record.batch_id
                    );
                    report.failed.push(UncollectedBatch { record, error: e });
                }
            }
        }
        Ok(report)
    }

    async fn collect(&self, record: &JobRecord, triples_path: &Path) -> Result<usize, ElicitError> {
        let parser = self.parser_for(record)?;
        let triples = self.tracker.finalize(record, parser.as_ref()).await?;
        write_triples_csv(triples_path, &triples)?;
        Ok(triples.len())
    }

    /// Template files in name order. Hidden files are skipped.
    fn template_files(&self) -> Result<Vec<PathBuf>, ElicitError> {
        if !self.template_dir.is_dir() {
            return Err(ElicitError::MissingTemplateDir(self.template_dir.clone()));
        }
        let entries = fs::read_dir(&self.template_dir).map_err(|source| ElicitError::Io {
            path: self.template_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ElicitError::Io {
                path: self.template_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if path.is_file() && !hidden {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(ElicitError::NoTemplates(self.template_dir.clone()));
        }
        files.sort();
        Ok(files)
    }

    /// Finds the prompter that produced `record`, so its parser reads the
    /// results. Falls back to the mapping log for records that predate the
    /// template name field, then to the default JSON-schema parser.
    fn parser_for(&self, record: &JobRecord) -> Result<Box<dyn PrompterParser>, ElicitError> {
        let mut name = record.source_template_name.clone();
        if name.is_empty() {
            name = self
                .tracker
                .store()
                .read_mapping()?
                .into_iter()
                .rev()
                .find(|entry| entry.index == record.source_index)
                .map(|entry| entry.template_name)
                .unwrap_or_default();
        }

        let path = self.template_dir.join(&name);
        if !name.is_empty() && path.is_file() {
            return Ok(Box::new(JsonSchemaPrompter::from_file(&path, &self.model)?));
        }
        if !name.is_empty() {
            warn!(
                "Template '{name}' for batch {} not found; using the default parser.",
                record.batch_id
            );
        }
        Ok(Box::new(JsonSchemaPrompter::new(&name, "", &self.model)))
    }
}
