pub mod agent;
pub mod compose;
pub mod dispatch;
pub mod extract;
pub mod prompts;
pub mod relevancy;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{Agent, AgentConfig};
pub use compose::{ReplyComposer, APOLOGY};
pub use dispatch::ActionDispatcher;
pub use extract::IntentExtractor;
pub use relevancy::RelevancyGate;
pub use resolver::{EventResolver, Resolution};
pub use store::{ConversationStore, EvictionPolicy};

/// Models wrap JSON answers in markdown fences often enough that every
/// JSON-mode consumer strips them before parsing.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
