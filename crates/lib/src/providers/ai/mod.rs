pub mod openai;

use crate::errors::ProviderError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

pub use openai::OpenAiChatProvider;

/// A trait for single-turn chat completions.
///
/// The judge uses it to classify a statement against a piece of evidence; any
/// chat model reachable over an OpenAI-compatible API can stand behind it.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

dyn_clone::clone_trait_object!(AiProvider);
