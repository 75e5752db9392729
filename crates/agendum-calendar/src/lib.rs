pub mod error;
pub mod google;
pub mod oauth;
pub mod token;

use agendum_schema::{CandidateEvent, Intent};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub use error::CalendarError;
pub use google::GoogleCalendar;
pub use oauth::OAuthConfig;
pub use token::{StoredToken, TokenStore};

/// Fields for a create or partial-update mutation, copied verbatim from the
/// extracted intent. Field semantics (date + time composition, attendee
/// validation) live behind the `CalendarStore` implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub participants: Vec<String>,
}

impl EventDraft {
    pub fn from_intent(intent: &Intent) -> Self {
        Self {
            summary: intent.event_name.clone(),
            date: intent.date,
            start_time: intent.start_time,
            end_time: intent.end_time,
            description: intent.description.clone(),
            participants: intent.participants.clone(),
        }
    }
}

/// Search parameters: `event_name` is advisory free text, `date` restricts
/// to that day's `[00:00:00Z, 23:59:59Z]` window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuery {
    pub event_name: Option<String>,
    pub date: Option<NaiveDate>,
}

impl EventQuery {
    pub fn from_intent(intent: &Intent) -> Self {
        Self {
            event_name: intent.event_name.clone(),
            date: intent.date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandle {
    pub event_id: String,
    pub event_link: Option<String>,
}

/// Calendar backend collaborator. Query results come back ordered ascending
/// by start time; callers never re-sort.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    /// Consent URL the user must visit to (re-)link their account.
    async fn auth_url(&self) -> Result<String, CalendarError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<EventHandle, CalendarError>;

    async fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<EventHandle, CalendarError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<CandidateEvent>, CalendarError>;
}
