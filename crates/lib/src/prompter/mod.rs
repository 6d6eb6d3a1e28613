//! # Prompting Strategies
//!
//! A prompting strategy knows how to turn a subject into one batch request and
//! how to turn one line of the provider's batch output back into triples. The
//! batch tracker only sees this trait, so new strategies plug in without
//! touching the job lifecycle.

pub mod json_schema;

use crate::types::Triple;
use serde_json::Value;
use thiserror::Error;

pub use json_schema::{parse_batch_line, JsonSchemaPrompter};

/// Why a single batch output line yielded no triples.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Response did not finish normally: finish_reason={0}")]
    FinishReason(String),
    #[error("Model refused the request: refusal={0}")]
    Refusal(String),
    #[error("Key '{0}' not found in response")]
    MissingKey(String),
    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

/// Errors raised while building a request from a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Rendered template for '{subject}' is not valid JSON: {source}")]
    Render {
        subject: String,
        source: serde_json::Error,
    },
}

/// The request-building and response-parsing halves of a prompting strategy.
pub trait PrompterParser: Send + Sync {
    /// Builds one batch request line for `subject`.
    fn build_request(&self, subject: &str) -> Result<Value, TemplateError>;

    /// Extracts the triples contained in one line of batch output.
    ///
    /// Implementations must be pure: no I/O, same input, same output.
    fn parse_response(&self, raw: &str) -> Result<Vec<Triple>, ParseError>;

    /// A short name identifying where the requests came from, usually the
    /// template file name.
    fn source_name(&self) -> &str;
}
