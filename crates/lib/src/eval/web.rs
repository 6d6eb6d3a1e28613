//! # Web Snippet Verification
//!
//! Checks triples against web search results instead of the gold reference.
//! Search results are cached per seed in `<snippet_dir>/<seed>.json`, keyed
//! by query, so a repeated run does not query the search engine again.

use super::judge::Judge;
use super::verdict::{JudgeOutcome, Tally};
use super::EvalError;
use crate::providers::search::SearchProvider;
use crate::types::{humanize, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// A triple with the search snippets found for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTriple {
    #[serde(flatten)]
    pub triple: Triple,
    pub snippets: Vec<String>,
}

/// `subject object`, underscores turned into spaces.
pub fn search_query(triple: &Triple) -> String {
    format!("{} {}", humanize(&triple.subject), humanize(&triple.object))
}

pub struct WebVerifier<'a> {
    search: &'a dyn SearchProvider,
    judge: &'a Judge,
    cache_path: PathBuf,
    delay: Duration,
}

impl<'a> WebVerifier<'a> {
    pub fn new(
        search: &'a dyn SearchProvider,
        judge: &'a Judge,
        snippet_dir: &Path,
        seed: &str,
        delay: Duration,
    ) -> Self {
        Self {
            search,
            judge,
            cache_path: snippet_dir.join(format!("{seed}.json")),
            delay,
        }
    }

    /// Attaches search snippets to every triple, querying only what the cache
    /// does not hold. Consecutive queries are `delay` apart.
    pub async fn enrich(&self, triples: &[Triple]) -> Result<Vec<EnrichedTriple>, EvalError> {
        let mut cache = self.load_cache()?;
        let mut queried = 0usize;

        for triple in triples {
            let query = search_query(triple);
            if cache.contains_key(&query) {
                continue;
            }
            if queried > 0 {
                tokio::time::sleep(self.delay).await;
            }
            info!("Processing the search query: {query}");
            let snippets = self.search.search(&query).await?;
            if snippets.is_empty() {
                warn!("No search results for '{query}'.");
            }
            cache.insert(query, snippets);
            queried += 1;
        }

        if queried > 0 {
            self.save_cache(&cache)?;
        } else {
            info!("All snippets found in '{}'.", self.cache_path.display());
        }

        Ok(triples
            .iter()
            .map(|triple| EnrichedTriple {
                snippets: cache.get(&search_query(triple)).cloned().unwrap_or_default(),
                triple: triple.clone(),
            })
            .collect())
    }

    /// Judges every enriched triple. Triples without snippets are counted as
    /// `no_evidence` without asking the judge.
    pub async fn verify(&self, enriched: &[EnrichedTriple]) -> Result<Tally, EvalError> {
        let mut tally = Tally::default();
        for item in enriched {
            let outcome = if item.snippets.is_empty() {
                JudgeOutcome::NoEvidence
            } else {
                self.judge
                    .against_snippets(&item.triple.statement(), &item.snippets)
                    .await?
            };
            tally.record(&outcome);
        }
        Ok(tally)
    }

    fn load_cache(&self) -> Result<BTreeMap<String, Vec<String>>, EvalError> {
        match fs::read_to_string(&self.cache_path) {
            Ok(content) if !content.trim().is_empty() => Ok(serde_json::from_str(&content)?),
            Ok(_) => Ok(BTreeMap::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(EvalError::io(&self.cache_path, e)),
        }
    }

    fn save_cache(&self, cache: &BTreeMap<String, Vec<String>>) -> Result<(), EvalError> {
        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(cache)?;
        fs::write(&self.cache_path, json).map_err(|e| EvalError::io(&self.cache_path, e))?;
        info!("Snippets cached in '{}'.", self.cache_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_joins_subject_and_object() {
        let triple = Triple::new("Octavia_Butler", "born_in", "Pasadena,_California", "");
        assert_eq!(search_query(&triple), "Octavia Butler Pasadena, California");
    }
}
