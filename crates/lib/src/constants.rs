//! # Shared Constants
//!
//! File names, prefixes and headers shared by the elicitation and evaluation
//! pipelines. Everything that ends up on disk is named here.

/// Directory holding records of batches that are still running.
pub const IN_PROGRESS_DIR: &str = "progress_dir";

/// Directory holding records of batches the provider reported as completed.
pub const COMPLETED_DIR: &str = "completed_dir";

/// Directory holding the raw result blobs downloaded from the provider.
pub const RESULTS_DIR: &str = "results_dir";

/// Directory holding the JSONL request files handed to the provider.
pub const REQUEST_DIR: &str = "batch_request";

/// Append-only log mapping template names to batch indices.
pub const MAPPING_LOG_FILE: &str = "template_index.txt";

pub const IN_PROGRESS_PREFIX: &str = "in_progress_";
pub const COMPLETED_PREFIX: &str = "completed_";
pub const RESULTS_PREFIX: &str = "batch_results_";
pub const REQUEST_PREFIX: &str = "batch_request_";
pub const TRIPLES_CSV_PREFIX: &str = "wikidata_triples_";

/// The collection key the elicitation prompt asks the model to answer under.
pub const FACTS_KEY: &str = "facts";

/// The only `finish_reason` accepted as a complete answer.
pub const FINISH_REASON_STOP: &str = "stop";

/// Column order of every elicited triples CSV.
pub const TRIPLES_CSV_HEADER: [&str; 4] = ["subject", "predicate", "object", "subject_name"];

/// Header of the evaluation summary CSV.
pub const SUMMARY_CSV_HEADER: [&str; 7] = [
    "True",
    "Plausible",
    "Implausible",
    "False",
    "Total #Triples",
    "Metric",
    "Source Elicited File",
];

/// Tally key used when all source files are evaluated as one pool.
pub const POOLED_SOURCE: &str = "pooled";

/// Default file name of the cached gold reference.
pub const GOLD_FILE: &str = "wikidata_gold.json";

/// Default directory of the cached search snippets.
pub const SNIPPET_DIR: &str = "snippets";

pub const DEFAULT_MAX_SUBMIT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_SEARCH_DELAY_SECS: u64 = 2;
pub const DEFAULT_SNIPPET_TOP_K: usize = 5;
pub const DEFAULT_BATCH_ENDPOINT: &str = "/v1/chat/completions";
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";
pub const DEFAULT_JOB_DESCRIPTION: &str = "Knowledge Elicitation for Wiki data entities";
