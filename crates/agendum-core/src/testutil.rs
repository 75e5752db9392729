//! Scripted collaborator doubles for module tests.

use agendum_calendar::{CalendarError, CalendarStore, EventDraft, EventHandle, EventQuery};
use agendum_provider::{LlmProvider, LlmRequest, LlmResponse};
use agendum_schema::CandidateEvent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedProvider {
    pub fn replies(texts: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(texts.into_iter().map(Ok).collect()),
        })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(error.to_string())])),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))?;
        match next {
            Ok(text) => Ok(LlmResponse {
                text,
                input_tokens: None,
                output_tokens: None,
                stop_reason: Some("end_turn".into()),
            }),
            Err(error) => Err(anyhow!(error)),
        }
    }
}

#[derive(Default)]
pub struct ScriptedCalendar {
    pub authenticated: bool,
    pub events: Vec<CandidateEvent>,
    pub query_error: Option<CalendarError>,
    pub mutation_error: Option<CalendarError>,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl ScriptedCalendar {
    pub fn with_events(events: Vec<CandidateEvent>) -> Arc<Self> {
        Arc::new(Self {
            authenticated: true,
            events,
            ..Self::default()
        })
    }

    pub fn with_query_error(error: CalendarError) -> Arc<Self> {
        Arc::new(Self {
            authenticated: true,
            query_error: Some(error),
            ..Self::default()
        })
    }

    pub fn with_mutation_error(error: CalendarError) -> Arc<Self> {
        Arc::new(Self {
            authenticated: true,
            mutation_error: Some(error),
            ..Self::default()
        })
    }

    pub fn unauthenticated() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mutation_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

// CalendarError holds a reqwest variant and is not Clone.
fn replay(error: &CalendarError) -> CalendarError {
    match error {
        CalendarError::AuthRequired => CalendarError::AuthRequired,
        CalendarError::Invalid(m) => CalendarError::Invalid(m.clone()),
        CalendarError::Api { status, message } => CalendarError::Api {
            status: *status,
            message: message.clone(),
        },
        CalendarError::Http(_) => CalendarError::Invalid("http failure".to_string()),
    }
}

#[async_trait]
impl CalendarStore for ScriptedCalendar {
    async fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn auth_url(&self) -> Result<String, CalendarError> {
        Ok("https://accounts.example.com/consent".to_string())
    }

    async fn create_event(&self, _draft: &EventDraft) -> Result<EventHandle, CalendarError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.mutation_error {
            return Err(replay(error));
        }
        Ok(EventHandle {
            event_id: "evt-created".to_string(),
            event_link: Some("https://calendar.google.com/evt-created".to_string()),
        })
    }

    async fn update_event(
        &self,
        event_id: &str,
        _draft: &EventDraft,
    ) -> Result<EventHandle, CalendarError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.mutation_error {
            return Err(replay(error));
        }
        Ok(EventHandle {
            event_id: event_id.to_string(),
            event_link: Some(format!("https://calendar.google.com/{event_id}")),
        })
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), CalendarError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.mutation_error {
            return Err(replay(error));
        }
        Ok(())
    }

    async fn query_events(&self, _query: &EventQuery) -> Result<Vec<CandidateEvent>, CalendarError> {
        if let Some(error) = &self.query_error {
            return Err(replay(error));
        }
        Ok(self.events.clone())
    }
}
