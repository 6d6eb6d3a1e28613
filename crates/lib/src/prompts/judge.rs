//! # Judge Prompts
//!
//! Every judge prompt asks for a single letter as the first character of the
//! answer: `a` true, `b` plausible, `c` implausible, `d` false. The answer is
//! decoded by `eval::verdict::JudgeOutcome::decode`.

/// The answer options shared by all judge prompts.
///
/// Placeholder: `{evidence}` (the name of the evidence, e.g. "the snippet").
const VERDICT_OPTIONS: &str = "Please choose the correct option based on your answer and return only a or b or c or d:
a) The RDF statement is true according to {evidence}.
b) The RDF statement is plausible according to {evidence}.
c) The RDF statement is implausible according to {evidence}.
d) The RDF statement is false according to {evidence}.";

/// Used when the evidence is a set of web search snippets.
pub fn snippet_system_prompt() -> String {
    format!(
        "Can the given RDF be inferred from the given snippet? {}",
        VERDICT_OPTIONS.replace("{evidence}", "the snippet")
    )
}

/// Used when an elicited triple is checked against the reference facts known
/// for its subject.
pub fn precision_system_prompt() -> String {
    format!(
        "Can the given RDF be inferred from the given list of reference facts about the same subject? {}",
        VERDICT_OPTIONS.replace("{evidence}", "the reference facts")
    )
}

/// Used when a reference fact is checked against everything the model
/// generated for its subject.
pub fn recall_system_prompt() -> String {
    format!(
        "Is the given RDF supported by the given list of generated statements about the same subject? {}",
        VERDICT_OPTIONS.replace("{evidence}", "the generated statements")
    )
}

/// The user turn: the statement under test followed by its evidence.
///
/// Placeholders: `{statement}`, `{evidence_label}`, `{evidence}`
pub const JUDGE_USER_PROMPT: &str = "Statement to verify: {statement}.\n{evidence_label} to verify from: {evidence}";

pub fn judge_user_prompt(statement: &str, evidence_label: &str, evidence: &str) -> String {
    JUDGE_USER_PROMPT
        .replace("{statement}", statement)
        .replace("{evidence_label}", evidence_label)
        .replace("{evidence}", evidence)
}
