//! JSON-schema prompting: the template asks the model to answer with
//! `{"facts": [{"subject", "predicate", "object"}, ...]}`.

use super::{ParseError, PrompterParser, TemplateError};
use crate::constants::{FACTS_KEY, FINISH_REASON_STOP};
use crate::types::Triple;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

// --- Batch output envelope ---

#[derive(Deserialize, Debug)]
struct BatchOutputLine {
    custom_id: String,
    response: BatchResponse,
}

#[derive(Deserialize, Debug)]
struct BatchResponse {
    body: ResponseBody,
}

#[derive(Deserialize, Debug)]
struct ResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    finish_reason: Option<String>,
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    refusal: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Parses one line of batch output into triples.
///
/// The whole line fails when it is not JSON, when the model stopped for any
/// reason other than `stop`, when it refused, or when its answer is not an
/// object holding a `facts` list. Inside a good answer, facts missing one of
/// subject, predicate or object are dropped with a warning and the rest are
/// kept. Every surviving triple is stamped with the line's `custom_id`.
pub fn parse_batch_line(raw: &str) -> Result<Vec<Triple>, ParseError> {
    let line: BatchOutputLine = serde_json::from_str(raw.trim())?;
    let subject_name = line.custom_id;

    let choice = line
        .response
        .body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Shape("response carries no choices".to_string()))?;

    let finish_reason = choice.finish_reason.unwrap_or_else(|| "none".to_string());
    if finish_reason != FINISH_REASON_STOP {
        return Err(ParseError::FinishReason(finish_reason));
    }

    if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
        return Err(ParseError::Refusal(refusal));
    }

    let content = choice
        .message
        .content
        .ok_or_else(|| ParseError::Shape("message has no content".to_string()))?;
    let answer: Value = serde_json::from_str(&content)?;

    let facts = match answer {
        Value::Object(mut map) => map
            .remove(FACTS_KEY)
            .ok_or_else(|| ParseError::MissingKey(FACTS_KEY.to_string()))?,
        _ => return Err(ParseError::MissingKey(FACTS_KEY.to_string())),
    };
    let facts = match facts {
        Value::Array(items) => items,
        other => {
            return Err(ParseError::Shape(format!(
                "'{FACTS_KEY}' is not a list: {other}"
            )))
        }
    };

    let mut triples = Vec::with_capacity(facts.len());
    for fact in facts {
        match triple_from_fact(&fact, &subject_name) {
            Some(triple) => triples.push(triple),
            None => warn!("Subject: {subject_name}. Invalid triple format: {fact}"),
        }
    }
    Ok(triples)
}

fn triple_from_fact(fact: &Value, subject_name: &str) -> Option<Triple> {
    let map = fact.as_object()?;
    Some(Triple {
        subject: field(map, "subject")?,
        predicate: field(map, "predicate")?,
        object: field(map, "object")?,
        subject_name: subject_name.to_string(),
    })
}

/// Strings are taken as-is; numbers and booleans (e.g. a bare year) are
/// stringified. Null, lists and objects count as missing.
fn field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// --- Prompter ---

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"))
}

/// Renders `{{ name }}` placeholders. Values are JSON-escaped because the
/// templates are JSON documents; unknown placeholders are left untouched.
fn render(template: &str, params: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match params.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => json_escape(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn json_escape(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// The JSON-schema prompting strategy bound to one template file.
#[derive(Debug, Clone)]
pub struct JsonSchemaPrompter {
    name: String,
    template: String,
    model: String,
}

impl JsonSchemaPrompter {
    pub fn new(name: &str, template: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            model: model.to_string(),
        }
    }

    /// Loads a template file; the file name becomes the source name.
    pub fn from_file(path: &Path, model: &str) -> Result<Self, TemplateError> {
        let template = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(&name, &template, model))
    }
}

impl PrompterParser for JsonSchemaPrompter {
    fn build_request(&self, subject: &str) -> Result<Value, TemplateError> {
        let rendered = render(
            &self.template,
            &[("subject_name", subject), ("model", &self.model)],
        );
        serde_json::from_str(&rendered).map_err(|source| TemplateError::Render {
            subject: subject.to_string(),
            source,
        })
    }

    fn parse_response(&self, raw: &str) -> Result<Vec<Triple>, ParseError> {
        parse_batch_line(raw)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
