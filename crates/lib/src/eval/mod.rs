//! # Evaluation
//!
//! Measures how much of what the model elicited is backed by evidence
//! (precision) and how much of the gold reference it captured (recall).
//! Evidence comes from either the structured reference knowledge base or web
//! search snippets; a judge model classifies each statement into one of four
//! verdicts, and the verdicts are aggregated per source file.

pub mod gold;
pub mod join;
pub mod judge;
pub mod metrics;
pub mod verdict;
pub mod web;

use crate::config::EvalSettings;
use crate::constants::POOLED_SOURCE;
use crate::errors::ProviderError;
use crate::providers::reference::ReferenceSource;
use crate::providers::search::SearchProvider;
use crate::sampling::{sample_without_replacement, seeded_rng};
use crate::triples_csv::{read_triples_dir, TriplesFileError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub use gold::{load_or_build, GoldReference};
pub use join::{EvidenceJoin, SourceFiles};
pub use judge::Judge;
pub use metrics::{aggregate, write_summary, MetricKind, MetricRow};
pub use verdict::{JudgeOutcome, Tally, Verdict};
pub use web::{EnrichedTriple, WebVerifier};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid evaluation setup: {0}")]
    Config(String),
    #[error("Triples directory '{0}' does not exist")]
    MissingTriplesDir(PathBuf),
    #[error(
        "No verdicts for '{file}' ({no_evidence} without evidence, {unrecognized} unrecognized); cannot compute fractions, so the rows of every other file were discarded and no summary was written"
    )]
    EmptySample {
        file: String,
        no_evidence: usize,
        unrecognized: usize,
    },
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Triples file error: {0}")]
    Triples(#[from] TriplesFileError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl EvalError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the evidence for a verdict comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    /// Web search snippets.
    Web,
    /// The structured reference knowledge base.
    Wikidata,
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMethod::Web => f.write_str("web"),
            VerificationMethod::Wikidata => f.write_str("wikidata"),
        }
    }
}

/// `results_<method>_<metric>_<seed>.csv`
pub fn results_file_name(method: VerificationMethod, metric: MetricKind, seed: &str) -> String {
    format!("results_{method}_{metric}_{seed}.csv")
}

/// The outcome of an evaluation run.
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub tallies: BTreeMap<String, Tally>,
    pub rows: Vec<MetricRow>,
    pub output_path: PathBuf,
}

/// Drives one evaluation run from the triples directory to the summary CSV.
pub struct Evaluator<'a> {
    judge: Judge,
    settings: EvalSettings,
    reference: Option<&'a dyn ReferenceSource>,
    search: Option<&'a dyn SearchProvider>,
}

impl<'a> Evaluator<'a> {
    pub fn new(judge: Judge, settings: EvalSettings) -> Self {
        Self {
            judge,
            settings,
            reference: None,
            search: None,
        }
    }

    pub fn with_reference(mut self, reference: &'a dyn ReferenceSource) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_search(mut self, search: &'a dyn SearchProvider) -> Self {
        self.search = Some(search);
        self
    }

    /// Rejects a run that cannot succeed, before any file is read or any
    /// service is called.
    pub fn check_preconditions(
        triples_dir: &Path,
        method: VerificationMethod,
        metric: MetricKind,
    ) -> Result<(), EvalError> {
        if !triples_dir.is_dir() {
            return Err(EvalError::MissingTriplesDir(triples_dir.to_path_buf()));
        }
        if method == VerificationMethod::Web && metric == MetricKind::Recall {
            return Err(EvalError::Config(
                "web verification only supports the precision metric".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn run(
        &self,
        triples_dir: &Path,
        subjects: &[String],
        method: VerificationMethod,
        metric: MetricKind,
        results_dir: &Path,
    ) -> Result<EvalReport, EvalError> {
        Self::check_preconditions(triples_dir, method, metric)?;

        let tallies = match method {
            VerificationMethod::Wikidata => {
                let reference = self.reference.ok_or_else(|| {
                    EvalError::Config("wikidata verification needs a reference source".to_string())
                })?;
                let files = self.load_files(triples_dir)?;
                info!("Evaluating {} source files against the gold reference ({metric}).", files.len());
                let gold = load_or_build(&self.settings.gold_path, subjects, reference).await?;
                let join = EvidenceJoin::new(
                    &self.judge,
                    self.settings.sample_size,
                    &self.settings.seed,
                );
                match metric {
                    MetricKind::Precision => join.precision(&files, &gold).await?,
                    MetricKind::Recall => join.recall(&files, &gold).await?,
                }
            }
            VerificationMethod::Web => {
                let search = self.search.ok_or_else(|| {
                    EvalError::Config("web verification needs a search provider".to_string())
                })?;
                let files = self.load_files(triples_dir)?;
                info!("Evaluating {} source files against web snippets.", files.len());
                self.web_precision(search, &files).await?
            }
        };

        let rows = tallies
            .iter()
            .map(|(source, tally)| aggregate(source, tally, metric))
            .collect::<Result<Vec<_>, _>>()?;

        let output_path =
            results_dir.join(results_file_name(method, metric, &self.settings.seed));
        write_summary(&output_path, &rows)?;

        Ok(EvalReport {
            tallies,
            rows,
            output_path,
        })
    }

    fn load_files(&self, triples_dir: &Path) -> Result<SourceFiles, EvalError> {
        let files = read_triples_dir(triples_dir)?;
        if !self.settings.pool_files {
            return Ok(files);
        }
        let pooled = files.into_values().flatten().collect::<Vec<_>>();
        Ok(SourceFiles::from([(POOLED_SOURCE.to_string(), pooled)]))
    }

    async fn web_precision(
        &self,
        search: &dyn SearchProvider,
        files: &SourceFiles,
    ) -> Result<BTreeMap<String, Tally>, EvalError> {
        let verifier = WebVerifier::new(
            search,
            &self.judge,
            &self.settings.snippet_dir,
            &self.settings.seed,
            self.settings.search_delay,
        );
        let mut rng = seeded_rng(&self.settings.seed);
        let mut tallies = BTreeMap::new();
        for (source, triples) in files {
            let sampled = sample_without_replacement(triples, self.settings.sample_size, &mut rng);
            info!(
                "Web: verifying {} of {} triples from '{source}'.",
                sampled.len(),
                triples.len()
            );
            let enriched = verifier.enrich(&sampled).await?;
            tallies.insert(source.clone(), verifier.verify(&enriched).await?);
        }
        Ok(tallies)
    }
}
