pub mod openai;

use crate::errors::ProviderError;
use crate::types::BatchStatus;
use async_trait::async_trait;

pub use openai::OpenAiBatchProvider;

/// Parameters of a batch creation call.
#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub endpoint: String,
    pub completion_window: String,
    pub description: String,
}

/// The asynchronous batch API of an LLM provider.
///
/// A batch is created from an uploaded JSONL request file, runs remotely for
/// as long as it takes, and eventually exposes a JSONL result blob.
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Uploads a request file and returns the provider's file id.
    async fn upload_requests(&self, file_name: &str, payload: Vec<u8>)
        -> Result<String, ProviderError>;

    /// Starts a batch over an uploaded file and returns its batch id.
    ///
    /// Implementations must report throttling as `ProviderError::RateLimited`.
    async fn create_batch(&self, input_file_id: &str, spec: &BatchSpec)
        -> Result<String, ProviderError>;

    async fn get_status(&self, batch_id: &str) -> Result<BatchStatus, ProviderError>;

    /// Downloads the newline-delimited JSON output of a finished batch.
    async fn fetch_result(&self, batch_id: &str) -> Result<Vec<u8>, ProviderError>;
}
