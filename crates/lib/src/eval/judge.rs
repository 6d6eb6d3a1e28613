use super::verdict::JudgeOutcome;
use crate::errors::ProviderError;
use crate::prompts::judge::{
    judge_user_prompt, precision_system_prompt, recall_system_prompt, snippet_system_prompt,
};
use crate::providers::ai::AiProvider;
use tracing::{debug, warn};

/// Wraps the judge model. Answers are decoded here and nowhere else.
#[derive(Debug, Clone)]
pub struct Judge {
    provider: Box<dyn AiProvider>,
}

impl Judge {
    pub fn new(provider: Box<dyn AiProvider>) -> Self {
        Self { provider }
    }

    /// Classifies `statement` against web search snippets.
    pub async fn against_snippets(
        &self,
        statement: &str,
        snippets: &[String],
    ) -> Result<JudgeOutcome, ProviderError> {
        if snippets.is_empty() {
            return Ok(JudgeOutcome::NoEvidence);
        }
        let mut evidence = String::new();
        for snippet in snippets {
            evidence.push_str(snippet);
            evidence.push_str(" | ");
        }
        self.ask(&snippet_system_prompt(), statement, "Snippet", &evidence)
            .await
    }

    /// Classifies an elicited statement against the reference facts of its
    /// subject, formatted as `(s, p, o) | (s, p, o)`.
    pub async fn against_reference(
        &self,
        statement: &str,
        reference: &str,
    ) -> Result<JudgeOutcome, ProviderError> {
        self.ask(
            &precision_system_prompt(),
            statement,
            "Reference facts",
            reference,
        )
        .await
    }

    /// Classifies a reference statement against the elicited statements of
    /// its subject, comma-joined.
    pub async fn against_generated(
        &self,
        statement: &str,
        generated: &str,
    ) -> Result<JudgeOutcome, ProviderError> {
        self.ask(
            &recall_system_prompt(),
            statement,
            "Generated statements",
            generated,
        )
        .await
    }

    async fn ask(
        &self,
        system_prompt: &str,
        statement: &str,
        evidence_label: &str,
        evidence: &str,
    ) -> Result<JudgeOutcome, ProviderError> {
        let user_prompt = judge_user_prompt(statement, evidence_label, evidence);
        let answer = self.provider.generate(system_prompt, &user_prompt).await?;
        debug!("Judge answered '{}' for {statement}", answer.trim());

        let outcome = JudgeOutcome::decode(&answer);
        if let JudgeOutcome::Unrecognized(raw) = &outcome {
            warn!("Judge answer for {statement} falls into no category: '{raw}'");
        }
        Ok(outcome)
    }
}
