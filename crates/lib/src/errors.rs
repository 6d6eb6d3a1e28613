use thiserror::Error;

/// Errors raised by the external collaborators: the batch provider, the judge
/// model, the search engine and the reference knowledge base.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to the provider: {0}")]
    Request(reqwest::Error),
    #[error("Failed to deserialize provider response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Provider returned an error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Provider rate limit reached: {0}")]
    RateLimited(String),
    #[error("API key is missing: {0}")]
    MissingApiKey(String),
    #[error("Provider response is missing a field: {0}")]
    MissingField(String),
}

impl ProviderError {
    /// Maps a non-success HTTP response onto the matching variant.
    ///
    /// `429 Too Many Requests` becomes `RateLimited` so that callers can apply
    /// their retry policy to it and to nothing else.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status == 429 {
            ProviderError::RateLimited(body)
        } else {
            ProviderError::Api { status, body }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}
