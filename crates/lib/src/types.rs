use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject-predicate-object fact elicited from the model.
///
/// `subject_name` is the entity string that was sent in the request, while
/// `subject` is whatever the model wrote in the fact. The two differ when the
/// model paraphrases the entity. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub subject_name: String,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: &str, subject_name: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            subject_name: subject_name.to_string(),
        }
    }

    /// Renders the triple as `(s, p, o)` with underscores turned into spaces,
    /// which is the form shown to the judge.
    pub fn statement(&self) -> String {
        format!(
            "({}, {}, {})",
            humanize(&self.subject),
            humanize(&self.predicate),
            humanize(&self.object)
        )
    }
}

/// A fact taken from the structured reference knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoldTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl GoldTriple {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }
}

impl fmt::Display for GoldTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

pub(crate) fn humanize(text: &str) -> String {
    text.replace('_', " ")
}

/// The remote status of a batch as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BatchStatus {
    #[default]
    Created,
    Validating,
    InProgress,
    Finalizing,
    Parsing,
    Completed,
    /// Anything the tracker does not know how to handle (failed, expired,
    /// cancelled, ...). Such records are left where they are.
    Unexpected(String),
}

impl BatchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Parsing => "parsing",
            BatchStatus::Completed => "completed",
            BatchStatus::Unexpected(other) => other,
        }
    }

    /// True for the statuses a batch passes through before completing.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            BatchStatus::Created
                | BatchStatus::Validating
                | BatchStatus::InProgress
                | BatchStatus::Finalizing
                | BatchStatus::Parsing
        )
    }
}

impl From<&str> for BatchStatus {
    fn from(value: &str) -> Self {
        match value {
            "created" => BatchStatus::Created,
            "validating" => BatchStatus::Validating,
            "in_progress" => BatchStatus::InProgress,
            "finalizing" => BatchStatus::Finalizing,
            "parsing" => BatchStatus::Parsing,
            "completed" => BatchStatus::Completed,
            other => BatchStatus::Unexpected(other.to_string()),
        }
    }
}

impl From<String> for BatchStatus {
    fn from(value: String) -> Self {
        BatchStatus::from(value.as_str())
    }
}

impl From<BatchStatus> for String {
    fn from(value: BatchStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable record of one batch submission.
///
/// Only `batch_id` is required when reading; older marker files that hold
/// nothing else still load, and the store fills `source_index` from the file
/// name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub batch_id: String,
    #[serde(default)]
    pub status: BatchStatus,
    #[serde(default)]
    pub source_index: u32,
    #[serde(default)]
    pub source_template_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(batch_id: String, source_index: u32, source_template_name: &str) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Created,
            source_index,
            source_template_name: source_template_name.to_string(),
            submitted_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_status_round_trips_known_and_unknown_values() {
        assert_eq!(BatchStatus::from("in_progress"), BatchStatus::InProgress);
        assert_eq!(
            BatchStatus::from("expired"),
            BatchStatus::Unexpected("expired".to_string())
        );
        assert_eq!(String::from(BatchStatus::Completed), "completed");
        assert!(BatchStatus::Parsing.is_in_flight());
        assert!(!BatchStatus::Completed.is_in_flight());
        assert!(!BatchStatus::Unexpected("failed".into()).is_in_flight());
    }

    #[test]
    fn legacy_marker_with_only_batch_id_loads() {
        let record: JobRecord = serde_json::from_str(r#"{"batch_id": "batch_abc"}"#).unwrap();
        assert_eq!(record.batch_id, "batch_abc");
        assert_eq!(record.status, BatchStatus::Created);
        assert_eq!(record.source_index, 0);
        assert!(record.submitted_at.is_none());
    }

    #[test]
    fn statement_replaces_underscores() {
        let triple = Triple::new("Octavia_Butler", "born_in", "Pasadena", "Octavia Butler");
        assert_eq!(triple.statement(), "(Octavia Butler, born in, Pasadena)");
    }
}
