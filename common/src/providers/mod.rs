mod fake;
mod openai;

pub use fake::FakeAi;
pub use openai::OpenAiProvider;

use crate::{
    error::AppError,
    utils::config::{AiProviderKind, AppConfig},
};

/// Markers the prompt builders embed so the deterministic fake can tell the
/// prompt kinds apart. The real model simply reads them as instructions.
pub const SYNTHESIS_INSTRUCTION: &str = "Answer ONLY from the listed chunks.";
pub const CLAIM_SPLIT_INSTRUCTION: &str = "Split the answer into atomic factual claims";
pub const CLAIM_SCORE_INSTRUCTION: &str =
    "Score how strongly the evidence supports or contradicts the claim";

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    pub usage: TokenUsage,
}

/// Uniform seam over the language model and the embedder. The fake variant
/// is pure: identical inputs produce byte-identical outputs, which the
/// determinism tests rely on.
#[derive(Clone)]
pub enum AiProvider {
    OpenAi(OpenAiProvider),
    Fake(FakeAi),
}

impl AiProvider {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.ai_provider {
            AiProviderKind::Real => Self::OpenAi(OpenAiProvider::from_config(config)),
            AiProviderKind::Fake => Self::Fake(FakeAi::new(config.embed_dim)),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Fake(_) => "fake",
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::OpenAi(provider) => provider.dimension(),
            Self::Fake(fake) => fake.dimension(),
        }
    }

    /// Embed a batch of texts, one vector per input, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        match self {
            Self::OpenAi(provider) => provider.embed(texts).await,
            Self::Fake(fake) => Ok(texts.iter().map(|text| fake.embed_one(text)).collect()),
        }
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatOutcome, AppError> {
        match self {
            Self::OpenAi(provider) => provider.chat(system, user).await,
            Self::Fake(fake) => Ok(fake.chat(user)),
        }
    }
}
