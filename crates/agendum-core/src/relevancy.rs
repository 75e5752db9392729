use crate::prompts;
use agendum_provider::{LlmProvider, LlmRequest};
use agendum_schema::{RelevancyVerdict, Turn};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides whether a message should enter the calendar pipeline at all.
/// Fails closed: any provider or parse failure classifies as irrelevant,
/// which routes the message to small talk instead of a mutation path.
pub struct RelevancyGate {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl RelevancyGate {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn classify(&self, message: &str, history: &[Turn]) -> RelevancyVerdict {
        let request = LlmRequest::json(
            self.model.clone(),
            Some(prompts::relevancy_prompt(history)),
            format!("User message: {message}"),
        );

        let text = match self.provider.complete(request).await {
            Ok(resp) => resp.text,
            Err(error) => {
                warn!(%error, "relevancy call failed, treating as irrelevant");
                return RelevancyVerdict::irrelevant_fallback();
            }
        };

        match serde_json::from_str::<RelevancyVerdict>(crate::strip_code_fences(&text)) {
            Ok(verdict) => {
                debug!(relevant = verdict.relevant, reason = %verdict.reason, "classified message");
                verdict
            }
            Err(error) => {
                warn!(%error, raw = %text, "unparseable relevancy verdict, treating as irrelevant");
                RelevancyVerdict::irrelevant_fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedProvider;

    #[tokio::test]
    async fn parses_a_relevant_verdict() {
        let provider = ScriptedProvider::replies(vec![
            r#"{"relevant": true, "reason": "scheduling request"}"#.into(),
        ]);
        let gate = RelevancyGate::new(provider, "test-model");
        let verdict = gate.classify("Schedule a meeting", &[]).await;
        assert!(verdict.relevant);
        assert_eq!(verdict.reason, "scheduling request");
    }

    #[tokio::test]
    async fn strips_code_fences_before_parsing() {
        let provider = ScriptedProvider::replies(vec![
            "```json\n{\"relevant\": false, \"reason\": \"greeting\"}\n```".into(),
        ]);
        let gate = RelevancyGate::new(provider, "test-model");
        let verdict = gate.classify("Hi", &[]).await;
        assert!(!verdict.relevant);
    }

    #[tokio::test]
    async fn provider_failure_classifies_as_irrelevant() {
        let provider = ScriptedProvider::failing("timeout");
        let gate = RelevancyGate::new(provider, "test-model");
        let verdict = gate.classify("Schedule a meeting", &[]).await;
        assert!(!verdict.relevant);
        assert_eq!(verdict.reason, "Failed to process response");
    }

    #[tokio::test]
    async fn malformed_json_classifies_as_irrelevant() {
        let provider = ScriptedProvider::replies(vec!["sure, that's calendar-related".into()]);
        let gate = RelevancyGate::new(provider, "test-model");
        let verdict = gate.classify("Schedule a meeting", &[]).await;
        assert!(!verdict.relevant);
        assert_eq!(verdict.reason, "Failed to process response");
    }
}
