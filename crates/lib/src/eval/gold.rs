//! Builds and caches the gold reference: every entity-valued claim of every
//! subject, with ids resolved to labels.

use super::EvalError;
use crate::providers::reference::{ClaimValue, ReferenceSource};
use crate::types::GoldTriple;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Gold triples keyed by the subject string they were looked up with.
pub type GoldReference = BTreeMap<String, Vec<GoldTriple>>;

/// Loads the gold reference from `path`, building it from `source` first if
/// the file is missing or empty.
///
/// An existing non-empty file is used as-is, even if it covers different
/// subjects. A subject the reference source cannot resolve is skipped with a
/// warning and gets no gold triples.
pub async fn load_or_build(
    path: &Path,
    subjects: &[String],
    source: &dyn ReferenceSource,
) -> Result<GoldReference, EvalError> {
    if let Some(gold) = load(path)? {
        info!(
            "Loaded gold reference for {} subjects from '{}'.",
            gold.len(),
            path.display()
        );
        return Ok(gold);
    }

    let gold = build(subjects, source).await?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(&gold)?;
    fs::write(path, json).map_err(|e| EvalError::io(path, e))?;
    info!(
        "Gold reference for {} subjects written to '{}'.",
        gold.len(),
        path.display()
    );
    Ok(gold)
}

fn load(path: &Path) -> Result<Option<GoldReference>, EvalError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EvalError::io(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

async fn build(
    subjects: &[String],
    source: &dyn ReferenceSource,
) -> Result<GoldReference, EvalError> {
    let mut labels = LabelCache::default();
    let mut gold = GoldReference::new();

    for subject in subjects {
        if gold.contains_key(subject) {
            continue;
        }
        let Some(entity_id) = source.resolve_entity_id(subject).await? else {
            warn!("Subject '{subject}' has no reference entity; skipping it.");
            continue;
        };
        let claims = source.fetch_claims(&entity_id).await?;

        let mut triples = Vec::new();
        for (property, values) in &claims {
            for value in values {
                let ClaimValue::Entity(object_id) = value else {
                    continue;
                };
                let Some(predicate) = labels.get(source, property).await? else {
                    continue;
                };
                let Some(object) = labels.get(source, object_id).await? else {
                    continue;
                };
                triples.push(GoldTriple::new(subject, &predicate, &object));
            }
        }
        info!(
            "Found {} gold triples for '{subject}' ({entity_id}).",
            triples.len()
        );
        gold.insert(subject.clone(), triples);
    }
    Ok(gold)
}

/// Labels resolved during one build, misses included.
#[derive(Default)]
struct LabelCache {
    labels: HashMap<String, Option<String>>,
}

impl LabelCache {
    async fn get(
        &mut self,
        source: &dyn ReferenceSource,
        id: &str,
    ) -> Result<Option<String>, EvalError> {
        if let Some(label) = self.labels.get(id) {
            return Ok(label.clone());
        }
        let label = source.resolve_label(id).await?;
        self.labels.insert(id.to_string(), label.clone());
        Ok(label)
    }
}
