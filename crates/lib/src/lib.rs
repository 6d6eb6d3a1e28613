//! # Knowledge Base Construction from Language Models
//!
//! This crate elicits subject-predicate-object triples from a language model
//! through asynchronous batch jobs, and evaluates what was elicited against a
//! structured reference knowledge base or web search evidence.
//!
//! The two pipelines are:
//!
//! 1.  **Elicitation:** [`elicitation::Elicitor`] renders one batch per
//!     template, submits it through [`tracker::BatchTracker`], and collects
//!     the completed batches into CSV files on a later run.
//! 2.  **Evaluation:** [`eval::Evaluator`] joins the elicited triples with
//!     their evidence, asks a judge model for a verdict on each statement and
//!     aggregates the verdicts into precision or recall fractions.

pub mod config;
pub mod constants;
pub mod elicitation;
pub mod errors;
pub mod eval;
pub mod prompter;
pub mod prompts;
pub mod providers;
pub mod sampling;
pub mod store;
pub mod subjects;
pub mod tracker;
pub mod triples_csv;
pub mod types;

pub use config::{EvalSettings, StorePaths, TrackerSettings};
pub use elicitation::{
    CollectedBatch, ElicitError, ElicitationMode, Elicitor, UncollectedBatch, VerifyReport,
};
pub use errors::ProviderError;
pub use eval::{EvalError, EvalReport, Evaluator, MetricKind, VerificationMethod};
pub use prompter::{parse_batch_line, JsonSchemaPrompter, ParseError, PrompterParser};
pub use store::{FsJobStore, JobStore, MemoryJobStore, Stage, StoreError};
pub use subjects::SubjectCatalog;
pub use tracker::{BatchTracker, StatusReport, TrackerError};
pub use types::{BatchStatus, GoldTriple, JobRecord, Triple};
