use super::{BatchProvider, BatchSpec};
use crate::{errors::ProviderError, providers::build_http_client, types::BatchStatus};
use async_trait::async_trait;
use reqwest::{multipart, Client as ReqwestClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Deserialize, Debug)]
struct FileObject {
    id: String,
}

#[derive(Serialize)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
    metadata: HashMap<&'a str, &'a str>,
}

#[derive(Deserialize, Debug)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
}

/// The OpenAI Batch API (`/files` + `/batches`).
#[derive(Clone, Debug)]
pub struct OpenAiBatchProvider {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
}

impl OpenAiBatchProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: &str, api_key: String) -> Result<Self, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::MissingApiKey("OPENAI_API_KEY".to_string()));
        }
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::Request)?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }
        Ok(response)
    }

    async fn retrieve(&self, batch_id: &str) -> Result<BatchObject, ProviderError> {
        let response = self
            .send(self.client.get(self.url(&format!("/batches/{batch_id}"))))
            .await?;
        response
            .json()
            .await
            .map_err(ProviderError::Deserialization)
    }
}

#[async_trait]
impl BatchProvider for OpenAiBatchProvider {
    async fn upload_requests(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<String, ProviderError> {
        let part = multipart::Part::bytes(payload).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);
        let response = self
            .send(self.client.post(self.url("/files")).multipart(form))
            .await?;
        let file: FileObject = response
            .json()
            .await
            .map_err(ProviderError::Deserialization)?;
        info!("Uploaded batch request file `{file_name}` as `{}`.", file.id);
        Ok(file.id)
    }

    async fn create_batch(
        &self,
        input_file_id: &str,
        spec: &BatchSpec,
    ) -> Result<String, ProviderError> {
        let body = CreateBatchRequest {
            input_file_id,
            endpoint: &spec.endpoint,
            completion_window: &spec.completion_window,
            metadata: HashMap::from([("description", spec.description.as_str())]),
        };
        let response = self
            .send(self.client.post(self.url("/batches")).json(&body))
            .await?;
        let batch: BatchObject = response
            .json()
            .await
            .map_err(ProviderError::Deserialization)?;
        Ok(batch.id)
    }

    async fn get_status(&self, batch_id: &str) -> Result<BatchStatus, ProviderError> {
        let batch = self.retrieve(batch_id).await?;
        debug!("Batch {} reported status {}", batch.id, batch.status);
        Ok(BatchStatus::from(batch.status))
    }

    async fn fetch_result(&self, batch_id: &str) -> Result<Vec<u8>, ProviderError> {
        let batch = self.retrieve(batch_id).await?;
        let output_file_id = batch.output_file_id.ok_or_else(|| {
            ProviderError::MissingField(format!("output_file_id of batch {batch_id}"))
        })?;
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/files/{output_file_id}/content"))),
            )
            .await?;
        let bytes = response.bytes().await.map_err(ProviderError::Request)?;
        Ok(bytes.to_vec())
    }
}
