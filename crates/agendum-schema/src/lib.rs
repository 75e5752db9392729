use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound chat message as seen by the pipeline. `text` is `None` for
/// media/sticker/voice updates the transport could not turn into text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub trace_id: Uuid,
    pub chat_id: i64,
    pub text: Option<String>,
    pub at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            chat_id,
            text: Some(text.into()),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub trace_id: Uuid,
    pub chat_id: i64,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized label used when rendering history into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    /// Reserved for media and other message types the pipeline ignores today.
    Other,
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub kind: TurnKind,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, kind: TurnKind) -> Self {
        Self {
            role,
            content: content.into(),
            kind,
            at: Utc::now(),
        }
    }

    pub fn render_line(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Render a history window into the one-line-per-turn block embedded in
/// prompts, e.g. `User: schedule lunch\nAssistant: done!`.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(Turn::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Create,
    Update,
    Delete,
    Query,
    Unknown,
}

/// Structured result of intent extraction. A value type: downstream stages
/// never mutate an Intent, they build new ones if needed.
#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub event_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub participants: Vec<String>,
    pub confirmation_needed: bool,
    pub error: Option<String>,
}

impl Intent {
    /// Fail-safe fallback: an unparseable extraction always asks the human
    /// before acting. `kind == Unknown` implies `error` is set and
    /// `confirmation_needed` is true; this constructor is the only way the
    /// pipeline produces an Unknown intent.
    pub fn unknown(error: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Unknown,
            event_name: None,
            date: None,
            start_time: None,
            end_time: None,
            description: None,
            participants: Vec::new(),
            confirmation_needed: true,
            error: Some(error.into()),
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self.kind,
            IntentKind::Create | IntentKind::Update | IntentKind::Delete
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelevancyVerdict {
    pub relevant: bool,
    pub reason: String,
}

impl RelevancyVerdict {
    /// Fail-closed default: anything we cannot classify is routed to small
    /// talk rather than risking an unintended calendar mutation.
    pub fn irrelevant_fallback() -> Self {
        Self {
            relevant: false,
            reason: "Failed to process response".to_string(),
        }
    }
}

/// Immutable snapshot of one calendar entry. `start`/`end` are the backend's
/// own strings (RFC 3339 for timed events, bare dates for all-day ones).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateEvent {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Executed,
    NeedsConfirmation,
    NoMatch,
    Error,
}

/// Result of the action dispatcher for one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub message: String,
    pub event_link: Option<String>,
}

impl DispatchOutcome {
    pub fn executed(message: impl Into<String>, event_link: Option<String>) -> Self {
        Self {
            status: DispatchStatus::Executed,
            message: message.into(),
            event_link,
        }
    }

    pub fn needs_confirmation(message: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::NeedsConfirmation,
            message: message.into(),
            event_link: None,
        }
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::NoMatch,
            message: message.into(),
            event_link: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Error,
            message: message.into(),
            event_link: None,
        }
    }
}
