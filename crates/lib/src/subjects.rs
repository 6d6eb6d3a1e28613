//! # Subject Catalog
//!
//! The curated list of entities to elicit facts about, stored as a JSON object
//! mapping a category name to an ordered list of subject strings.

use crate::sampling::sample_without_replacement;
use rand::Rng;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SubjectError {
    #[error("Failed to read subject list '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Subject list is not a category -> subjects object: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SubjectCatalog {
    categories: BTreeMap<String, Vec<String>>,
}

impl SubjectCatalog {
    pub fn from_path(path: &Path) -> Result<Self, SubjectError> {
        let content = fs::read_to_string(path).map_err(|source| SubjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            "Loaded {} subjects in {} categories from '{}'.",
            catalog.all_subjects().len(),
            catalog.categories.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SubjectError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn categories(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    /// Every subject, category by category. Duplicates are removed within a
    /// category only; the same name listed under two categories is kept twice.
    pub fn all_subjects(&self) -> Vec<String> {
        let mut subjects = Vec::new();
        for names in self.categories.values() {
            let mut seen = HashSet::new();
            for name in names {
                if seen.insert(name.as_str()) {
                    subjects.push(name.clone());
                }
            }
        }
        subjects
    }

    /// The full subject list, or a uniform sample of it.
    pub fn select<R: Rng + ?Sized>(&self, sample: Option<usize>, rng: &mut R) -> Vec<String> {
        sample_without_replacement(&self.all_subjects(), sample, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::seeded_rng;

    #[test]
    fn dedups_within_category_only() {
        let catalog = SubjectCatalog::from_json_str(
            r#"{"writers": ["Octavia Butler", "Octavia Butler", "Ursula K. Le Guin"],
                "scientists": ["Octavia Butler"]}"#,
        )
        .unwrap();
        let all = catalog.all_subjects();
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|s| *s == "Octavia Butler").count(), 2);
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(SubjectCatalog::from_json_str(r#"["a", "b"]"#).is_err());
    }

    #[test]
    fn select_samples_without_replacement() {
        let catalog =
            SubjectCatalog::from_json_str(r#"{"c": ["a", "b", "c", "d", "e"]}"#).unwrap();
        let picked = catalog.select(Some(3), &mut seeded_rng("1"));
        assert_eq!(picked.len(), 3);
        assert_eq!(catalog.select(None, &mut seeded_rng("1")).len(), 5);
    }
}
