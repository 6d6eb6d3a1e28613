use super::SearchProvider;
use crate::{errors::ProviderError, providers::build_http_client};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{info, warn};

pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Deserialize, Debug)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Deserialize, Debug)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize, Debug)]
struct BraveResult {
    #[serde(default)]
    description: Option<String>,
}

/// The Brave web search API.
#[derive(Clone, Debug)]
pub struct BraveSearchProvider {
    client: ReqwestClient,
    api_url: String,
    token: String,
    top_k: usize,
}

impl BraveSearchProvider {
    pub fn new(api_url: &str, token: String, top_k: usize) -> Result<Self, ProviderError> {
        if token.is_empty() {
            return Err(ProviderError::MissingApiKey(
                "BRAVE_SUBSCRIPTION_TOKEN".to_string(),
            ));
        }
        Ok(Self {
            client: build_http_client()?,
            api_url: api_url.to_string(),
            token,
            top_k,
        })
    }
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        info!("Processing the search query .. {query}");
        let response = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.token)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(ProviderError::Request)?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(ProviderError::Deserialization)?;

        let Some(web) = body.web else {
            warn!("Search response for '{query}' has no web results section.");
            return Ok(Vec::new());
        };

        Ok(web
            .results
            .into_iter()
            .filter_map(|r| r.description)
            .take(self.top_k)
            .collect())
    }
}
