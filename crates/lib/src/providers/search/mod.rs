pub mod brave;

use crate::errors::ProviderError;
use async_trait::async_trait;

pub use brave::BraveSearchProvider;

/// A web search engine returning result descriptions as evidence snippets.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the descriptions of the top results, best first.
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError>;
}
