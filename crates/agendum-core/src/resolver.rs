use agendum_calendar::{CalendarStore, EventQuery};
use agendum_schema::{CandidateEvent, Intent};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of matching an intent against the calendar. "Nothing matched"
/// and "the lookup itself failed" are distinct cases with distinct replies.
#[derive(Debug)]
pub enum Resolution {
    Found(Vec<CandidateEvent>),
    NoMatch,
    Failed { message: String, auth_required: bool },
}

pub struct EventResolver {
    calendar: Arc<dyn CalendarStore>,
}

impl EventResolver {
    pub fn new(calendar: Arc<dyn CalendarStore>) -> Self {
        Self { calendar }
    }

    /// Query candidates for an update/delete/query intent. Results arrive
    /// already ordered ascending by start time.
    pub async fn resolve(&self, intent: &Intent) -> Resolution {
        let query = EventQuery::from_intent(intent);
        match self.calendar.query_events(&query).await {
            Ok(events) if events.is_empty() => {
                debug!(?query.event_name, ?query.date, "no candidate events");
                Resolution::NoMatch
            }
            Ok(events) => {
                debug!(count = events.len(), "resolved candidate events");
                Resolution::Found(events)
            }
            Err(error) => {
                warn!(%error, "candidate lookup failed");
                Resolution::Failed {
                    message: error.to_string(),
                    auth_required: error.is_auth_required(),
                }
            }
        }
    }
}
