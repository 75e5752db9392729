use crate::compose::ReplyComposer;
use crate::dispatch::ActionDispatcher;
use crate::extract::IntentExtractor;
use crate::relevancy::RelevancyGate;
use crate::store::ConversationStore;
use agendum_calendar::CalendarStore;
use agendum_provider::LlmProvider;
use agendum_schema::{InboundMessage, OutboundMessage, Role, TurnKind};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const NON_TEXT_REPLY: &str =
    "I'm sorry, I didn't understand that. Can you please rephrase your message?";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    /// Turns of history visible to classification and extraction.
    pub history_window: usize,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            history_window: 10,
        }
    }
}

/// One inbound message in, one reply out. Collaborator faults never escape:
/// the worst case is the apology text, with detail in the logs.
pub struct Agent {
    store: Arc<ConversationStore>,
    calendar: Arc<dyn CalendarStore>,
    gate: RelevancyGate,
    extractor: IntentExtractor,
    dispatcher: ActionDispatcher,
    composer: ReplyComposer,
    history_window: usize,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        calendar: Arc<dyn CalendarStore>,
        store: Arc<ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            gate: RelevancyGate::new(provider.clone(), config.model.clone()),
            extractor: IntentExtractor::new(provider.clone(), config.model.clone()),
            dispatcher: ActionDispatcher::new(calendar.clone()),
            composer: ReplyComposer::new(provider, config.model),
            store,
            calendar,
            history_window: config.history_window,
        }
    }

    pub async fn handle(&self, inbound: &InboundMessage) -> OutboundMessage {
        let text = self.handle_text(inbound).await;
        OutboundMessage {
            trace_id: inbound.trace_id,
            chat_id: inbound.chat_id,
            text,
            at: Utc::now(),
        }
    }

    async fn handle_text(&self, inbound: &InboundMessage) -> String {
        let chat_id = inbound.chat_id;

        // Non-text updates never enter the pipeline or the history.
        let Some(message) = inbound.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            info!(trace_id = %inbound.trace_id, chat_id, "non-text message");
            return NON_TEXT_REPLY.to_string();
        };

        if !self.calendar.is_authenticated().await {
            return match self.calendar.auth_url().await {
                Ok(url) => {
                    info!(trace_id = %inbound.trace_id, chat_id, "handing out consent url");
                    format!(
                        "To use this bot, please authenticate your Google account: [Click here]({url})"
                    )
                }
                Err(error) => {
                    warn!(trace_id = %inbound.trace_id, %error, "could not build consent url");
                    crate::compose::APOLOGY.to_string()
                }
            };
        }

        self.store.append(chat_id, Role::User, message, TurnKind::Text);
        let history = self.store.recent(chat_id, self.history_window);
        let now = Utc::now();

        let verdict = self.gate.classify(message, &history).await;
        let reply = if verdict.relevant {
            let intent = self.extractor.extract(message, &history, now).await;
            let outcome = self.dispatcher.dispatch(&intent).await;
            info!(
                trace_id = %inbound.trace_id,
                chat_id,
                kind = ?intent.kind,
                mutation = intent.is_mutation(),
                status = ?outcome.status,
                "dispatched intent"
            );
            self.composer.compose(&outcome, &intent, &history, now).await
        } else {
            info!(trace_id = %inbound.trace_id, chat_id, reason = %verdict.reason, "small talk");
            self.composer.small_talk(message, &history, now).await
        };

        self.store.append(chat_id, Role::Assistant, reply.clone(), TurnKind::Text);
        reply
    }
}
