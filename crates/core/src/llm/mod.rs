pub mod anthropic;
pub mod engine;
pub mod error;
pub mod json;
pub mod openai;
pub mod prompts;

use crate::config::{LlmProviderKind, Settings};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

/// Single request/response round trip to a language model. No streaming, no
/// conversation state; callers build the full prompt every time.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(match settings.llm_provider {
        LlmProviderKind::OpenAI => Arc::new(openai::OpenAiClient::from_settings(settings)?),
        LlmProviderKind::Anthropic => {
            Arc::new(anthropic::AnthropicClient::from_settings(settings)?)
        }
    })
}
