//! # Collaborator Clients
//!
//! Minimal clients for the four external services the pipelines talk to. Each
//! concern is a trait so the pipelines can be driven by mocks in tests.

pub mod ai;
pub mod batch;
pub mod reference;
pub mod search;

pub(crate) fn build_http_client() -> Result<reqwest::Client, crate::errors::ProviderError> {
    reqwest::Client::builder()
        .build()
        .map_err(crate::errors::ProviderError::ReqwestClientBuild)
}
