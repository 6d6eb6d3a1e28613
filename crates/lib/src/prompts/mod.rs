//! # Prompt Templates
//!
//! Prompts sent to the judge model during evaluation. Elicitation prompts are
//! not here: they live in the template files given to the elicitation run.

pub mod judge;
