use crate::prompts;
use agendum_provider::{LlmProvider, LlmRequest};
use agendum_schema::{DispatchOutcome, DispatchStatus, Intent, Turn};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

/// Safety net shown whenever no better reply can be produced.
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble processing your message right now. Please try again later.";

/// Phrases the final reply. Deterministic outcomes pass through untouched;
/// only open-ended confirmation prompts and small talk go back to the model.
pub struct ReplyComposer {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl ReplyComposer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn compose(
        &self,
        outcome: &DispatchOutcome,
        intent: &Intent,
        history: &[Turn],
        now: DateTime<Utc>,
    ) -> String {
        let text = match outcome.status {
            DispatchStatus::Executed | DispatchStatus::NoMatch => outcome.message.clone(),
            DispatchStatus::NeedsConfirmation => {
                if outcome.message.is_empty() {
                    self.confirmation_prompt(intent, history, now).await
                } else {
                    outcome.message.clone()
                }
            }
            DispatchStatus::Error => outcome.message.clone(),
        };

        if text.is_empty() {
            APOLOGY.to_string()
        } else {
            text
        }
    }

    pub async fn small_talk(&self, message: &str, history: &[Turn], now: DateTime<Utc>) -> String {
        let request = LlmRequest::simple(
            self.model.clone(),
            Some(prompts::small_talk_prompt(message, history, now)),
            message.to_string(),
        );
        match self.provider.complete(request).await {
            Ok(resp) if !resp.text.trim().is_empty() => resp.text,
            Ok(_) => APOLOGY.to_string(),
            Err(error) => {
                warn!(%error, "small talk reply failed");
                APOLOGY.to_string()
            }
        }
    }

    /// Ask the model to phrase a clarifying question around the (possibly
    /// incomplete) extracted intent.
    async fn confirmation_prompt(
        &self,
        intent: &Intent,
        history: &[Turn],
        now: DateTime<Utc>,
    ) -> String {
        let event_data = match serde_json::to_string(intent) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "could not serialize intent for the agent prompt");
                return APOLOGY.to_string();
            }
        };
        let user_message = history
            .iter()
            .rev()
            .find(|turn| turn.role == agendum_schema::Role::User)
            .map(|turn| turn.content.clone())
            .unwrap_or_default();

        let request = LlmRequest::simple(
            self.model.clone(),
            Some(prompts::agent_prompt(&event_data, now)),
            user_message,
        );
        match self.provider.complete(request).await {
            Ok(resp) if !resp.text.trim().is_empty() => resp.text,
            Ok(_) => APOLOGY.to_string(),
            Err(error) => {
                warn!(%error, "confirmation reply failed");
                APOLOGY.to_string()
            }
        }
    }
}
