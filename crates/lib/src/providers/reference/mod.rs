pub mod wikidata;

use crate::errors::ProviderError;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use wikidata::WikidataClient;

/// The value side of a claim in the reference knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    /// A link to another entity, by id.
    Entity(String),
    /// Any other datavalue (dates, quantities, strings), rendered as text.
    Literal(String),
}

/// Claims of an entity keyed by property id, in property id order.
pub type Claims = BTreeMap<String, Vec<ClaimValue>>;

/// A structured knowledge base used as ground truth.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Finds the id of the best match for an entity name, if any.
    async fn resolve_entity_id(&self, name: &str) -> Result<Option<String>, ProviderError>;

    async fn fetch_claims(&self, entity_id: &str) -> Result<Claims, ProviderError>;

    /// Resolves the display label of an entity or a property id.
    async fn resolve_label(&self, id: &str) -> Result<Option<String>, ProviderError>;
}
