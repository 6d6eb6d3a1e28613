use super::{ClaimValue, Claims, ReferenceSource};
use crate::{errors::ProviderError, providers::build_http_client};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const WIKIDATA_API_URL: &str = "https://www.wikidata.org/w/api.php";
pub const WIKIDATA_ENTITY_DATA_URL: &str = "https://www.wikidata.org/wiki/Special:EntityData";

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    id: String,
}

#[derive(Deserialize, Debug)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityLabels>,
}

#[derive(Deserialize, Debug)]
struct EntityLabels {
    #[serde(default)]
    labels: HashMap<String, Label>,
}

#[derive(Deserialize, Debug)]
struct Label {
    value: String,
}

/// Client for the public Wikidata endpoints.
#[derive(Clone, Debug)]
pub struct WikidataClient {
    client: ReqwestClient,
    api_url: String,
    entity_data_url: String,
    language: String,
}

impl WikidataClient {
    pub fn new(api_url: &str, entity_data_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client()?,
            api_url: api_url.to_string(),
            entity_data_url: entity_data_url.trim_end_matches('/').to_string(),
            language: "en".to_string(),
        })
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ProviderError::Request)?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }
        response
            .json()
            .await
            .map_err(ProviderError::Deserialization)
    }
}

/// Turns a `mainsnak.datavalue.value` into a claim value.
fn claim_value(value: &Value) -> ClaimValue {
    match value {
        Value::String(s) => ClaimValue::Literal(s.clone()),
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("id") {
                return ClaimValue::Entity(id.clone());
            }
            for key in ["time", "amount", "text"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return ClaimValue::Literal(s.clone());
                }
            }
            ClaimValue::Literal(value.to_string())
        }
        other => ClaimValue::Literal(other.to_string()),
    }
}

pub(crate) fn parse_claims(entity_id: &str, document: &Value) -> Result<Claims, ProviderError> {
    let claims = document
        .get("entities")
        .and_then(|e| e.get(entity_id))
        .and_then(|e| e.get("claims"))
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::MissingField(format!("claims of {entity_id}")))?;

    let mut properties = Claims::new();
    for (property, statements) in claims {
        let values = statements
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|statement| statement.pointer("/mainsnak/datavalue/value"))
                    .map(claim_value)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        properties.insert(property.clone(), values);
    }
    Ok(properties)
}

#[async_trait]
impl ReferenceSource for WikidataClient {
    async fn resolve_entity_id(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let response: SearchResponse = self
            .get_json(
                &self.api_url,
                &[
                    ("action", "wbsearchentities"),
                    ("search", name),
                    ("language", &self.language),
                    ("format", "json"),
                ],
            )
            .await?;
        let id = response.search.into_iter().next().map(|hit| hit.id);
        if id.is_none() {
            warn!("No matches found for entity: {name}");
        }
        Ok(id)
    }

    async fn fetch_claims(&self, entity_id: &str) -> Result<Claims, ProviderError> {
        let url = format!("{}/{entity_id}.json", self.entity_data_url);
        let document: Value = self.get_json(&url, &[]).await?;
        let claims = parse_claims(entity_id, &document)?;
        debug!("Fetched {} properties for {entity_id}", claims.len());
        Ok(claims)
    }

    async fn resolve_label(&self, id: &str) -> Result<Option<String>, ProviderError> {
        let mut response: EntitiesResponse = self
            .get_json(
                &self.api_url,
                &[
                    ("action", "wbgetentities"),
                    ("ids", id),
                    ("languages", &self.language),
                    ("props", "labels"),
                    ("format", "json"),
                ],
            )
            .await?;
        let label = response
            .entities
            .remove(id)
            .and_then(|mut entity| entity.labels.remove(&self.language))
            .map(|label| label.value);
        if label.is_none() {
            warn!("No label found for ID: {id}");
        }
        Ok(label)
    }
}
