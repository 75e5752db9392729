pub mod gemini;
pub mod openai;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use types::*;

/// One language-model collaborator. Every call is fallible and possibly slow;
/// no retries happen at this layer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom base URL (uses the provider default when unset)
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let key = config
        .api_key
        .as_ref()
        .ok_or_else(|| anyhow!("{:?} provider requires api_key", config.provider_type))?;

    let provider: Arc<dyn LlmProvider> = match (&config.provider_type, &config.base_url) {
        (ProviderType::Gemini, Some(base)) => {
            Arc::new(GeminiProvider::with_base_url(key.clone(), base.clone()))
        }
        (ProviderType::Gemini, None) => Arc::new(GeminiProvider::new(key.clone())),
        (ProviderType::OpenAI, Some(base)) => {
            Arc::new(OpenAiProvider::with_base_url(key.clone(), base.clone()))
        }
        (ProviderType::OpenAI, None) => Arc::new(OpenAiProvider::new(key.clone())),
    };
    tracing::info!(provider = ?config.provider_type, model = %config.model, "configured llm provider");
    Ok(provider)
}

/// Deterministic provider for tests and offline smoke runs.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        let text = match request.format {
            ResponseFormat::Json => r#"{"stub":true}"#.to_string(),
            ResponseFormat::Freeform => format!("[stub:{}] {}", request.model, user_text),
        };
        Ok(LlmResponse {
            text,
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("end_turn".into()),
        })
    }
}
