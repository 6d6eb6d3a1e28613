//! # Evidence Join
//!
//! Joins elicited triples with the gold reference by subject and asks the
//! judge about each joined pair. Precision samples elicited triples and checks
//! them against gold; recall samples gold triples and checks them against
//! what was elicited.

use super::gold::GoldReference;
use super::judge::Judge;
use super::verdict::{JudgeOutcome, Tally};
use super::EvalError;
use crate::sampling::{sample_without_replacement, seeded_rng};
use crate::types::{GoldTriple, Triple};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Elicited triples keyed by the file they came from.
pub type SourceFiles = BTreeMap<String, Vec<Triple>>;

/// The subject under which a triple is joined with the gold reference: the
/// entity string that was sent to the model, or the triple's own subject for
/// files that do not record it.
pub fn join_key(triple: &Triple) -> &str {
    if triple.subject_name.is_empty() {
        &triple.subject
    } else {
        &triple.subject_name
    }
}

/// `(s, p, o) | (s, p, o)`
pub fn format_gold_list(gold: &[GoldTriple]) -> String {
    gold.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `(s, p, o), (s, p, o)`
pub fn format_elicited_list(triples: &[&Triple]) -> String {
    triples
        .iter()
        .map(|t| t.statement())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct EvidenceJoin<'a> {
    judge: &'a Judge,
    sample_size: Option<usize>,
    seed: String,
}

impl<'a> EvidenceJoin<'a> {
    pub fn new(judge: &'a Judge, sample_size: Option<usize>, seed: &str) -> Self {
        Self {
            judge,
            sample_size,
            seed: seed.to_string(),
        }
    }

    /// Checks a sample of each file's triples against the gold triples of
    /// their subject. Triples whose subject has no gold triples are still
    /// judged, against an empty reference list.
    pub async fn precision(
        &self,
        files: &SourceFiles,
        gold: &GoldReference,
    ) -> Result<BTreeMap<String, Tally>, EvalError> {
        let mut rng = seeded_rng(&self.seed);
        let mut tallies = BTreeMap::new();

        for (source, triples) in files {
            let sampled = sample_without_replacement(triples, self.sample_size, &mut rng);
            info!(
                "Precision: judging {} of {} triples from '{source}'.",
                sampled.len(),
                triples.len()
            );

            let mut tally = Tally::default();
            for triple in &sampled {
                let reference = gold.get(join_key(triple)).map(Vec::as_slice).unwrap_or_default();
                if reference.is_empty() {
                    debug!("No gold triples for '{}'.", join_key(triple));
                }
                let outcome = self
                    .judge
                    .against_reference(&triple.statement(), &format_gold_list(reference))
                    .await?;
                tally.record(&outcome);
            }
            tallies.insert(source.clone(), tally);
        }
        Ok(tallies)
    }

    /// Checks a sample of the gold triples of the subjects each file covers
    /// against everything the file says about the same subject.
    pub async fn recall(
        &self,
        files: &SourceFiles,
        gold: &GoldReference,
    ) -> Result<BTreeMap<String, Tally>, EvalError> {
        let mut rng = seeded_rng(&self.seed);
        let mut tallies = BTreeMap::new();

        for (source, triples) in files {
            let mut by_subject: BTreeMap<&str, Vec<&Triple>> = BTreeMap::new();
            for triple in triples {
                by_subject.entry(join_key(triple)).or_default().push(triple);
            }

            let mut pool = Vec::new();
            let mut covered = 0usize;
            for subject in by_subject.keys() {
                if let Some(reference) = gold.get(*subject) {
                    covered += 1;
                    pool.extend(reference.iter().cloned());
                }
            }
            if covered > 0 {
                info!(
                    "Recall: '{source}' covers {covered} gold subjects with {:.2} gold triples per subject on average.",
                    pool.len() as f64 / covered as f64
                );
            }

            let sampled = sample_without_replacement(&pool, self.sample_size, &mut rng);
            info!(
                "Recall: judging {} of {} gold triples for '{source}'.",
                sampled.len(),
                pool.len()
            );

            let mut tally = Tally::default();
            for reference in &sampled {
                let elicited = by_subject
                    .get(reference.subject.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let outcome = if elicited.is_empty() {
                    JudgeOutcome::NoEvidence
                } else {
                    self.judge
                        .against_generated(&reference.to_string(), &format_elicited_list(elicited))
                        .await?
                };
                tally.record(&outcome);
            }
            tallies.insert(source.clone(), tally);
        }
        Ok(tallies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_prefers_the_requested_subject() {
        let paraphrased = Triple::new("Butler", "bornIn", "Pasadena", "Octavia Butler");
        assert_eq!(join_key(&paraphrased), "Octavia Butler");
        let bare = Triple::new("Octavia Butler", "bornIn", "Pasadena", "");
        assert_eq!(join_key(&bare), "Octavia Butler");
    }

    #[test]
    fn evidence_lists_use_their_separators() {
        let gold = vec![
            GoldTriple::new("X", "occupation", "writer"),
            GoldTriple::new("X", "country of citizenship", "United States"),
        ];
        assert_eq!(
            format_gold_list(&gold),
            "(X, occupation, writer) | (X, country of citizenship, United States)"
        );

        let a = Triple::new("X", "born_in", "Pasadena", "X");
        let b = Triple::new("X", "occupation", "writer", "X");
        assert_eq!(
            format_elicited_list(&[&a, &b]),
            "(X, born in, Pasadena), (X, occupation, writer)"
        );
    }
}
