use crate::resolver::{EventResolver, Resolution};
use agendum_calendar::{CalendarError, CalendarStore, EventDraft};
use agendum_schema::{CandidateEvent, DispatchOutcome, Intent, IntentKind};
use std::sync::Arc;
use tracing::{info, warn};

/// Turns a validated intent into at most one calendar mutation and a
/// dispatch outcome. All branching on intent kind and match count lives
/// here; the composer only phrases what this decided.
pub struct ActionDispatcher {
    calendar: Arc<dyn CalendarStore>,
    resolver: EventResolver,
}

const NO_MATCH: &str = "No matching events found.";

impl ActionDispatcher {
    pub fn new(calendar: Arc<dyn CalendarStore>) -> Self {
        let resolver = EventResolver::new(calendar.clone());
        Self { calendar, resolver }
    }

    pub async fn dispatch(&self, intent: &Intent) -> DispatchOutcome {
        if intent.kind == IntentKind::Unknown || intent.confirmation_needed {
            // Empty message: the composer phrases the confirmation request.
            return DispatchOutcome::needs_confirmation("");
        }

        match intent.kind {
            IntentKind::Create => self.create(intent).await,
            IntentKind::Update => self.mutate_matched(intent, true).await,
            IntentKind::Delete => self.mutate_matched(intent, false).await,
            IntentKind::Query => self.query(intent).await,
            IntentKind::Unknown => unreachable!("handled above"),
        }
    }

    async fn create(&self, intent: &Intent) -> DispatchOutcome {
        let draft = EventDraft::from_intent(intent);
        match self.calendar.create_event(&draft).await {
            Ok(handle) => {
                info!(event_id = %handle.event_id, "created event");
                let link = handle.event_link.clone().unwrap_or_default();
                DispatchOutcome::executed(
                    format!("Event created successfully! Here's the link to your event: {link}"),
                    handle.event_link,
                )
            }
            Err(error) => self.calendar_failure(error, "create").await,
        }
    }

    /// Update and delete share the resolution step: zero candidates is a
    /// no-match reply, more than one asks the user to disambiguate, and
    /// only an unambiguous single match is mutated.
    async fn mutate_matched(&self, intent: &Intent, is_update: bool) -> DispatchOutcome {
        let events = match self.resolver.resolve(intent).await {
            Resolution::NoMatch => return DispatchOutcome::no_match(NO_MATCH),
            Resolution::Failed { auth_required, .. } => {
                return self.resolution_failure(auth_required).await;
            }
            Resolution::Found(events) => events,
        };

        if events.len() > 1 {
            info!(count = events.len(), "ambiguous match, asking user to pick");
            return DispatchOutcome::needs_confirmation(format!(
                "I found more than one matching event:\n{}\nPlease tell me which one you mean.",
                numbered_list(&events)
            ));
        }

        let target = &events[0];
        if is_update {
            let draft = EventDraft::from_intent(intent);
            match self.calendar.update_event(&target.id, &draft).await {
                Ok(handle) => {
                    info!(event_id = %handle.event_id, "updated event");
                    let link = handle.event_link.clone().unwrap_or_default();
                    DispatchOutcome::executed(
                        format!("Event updated successfully! Here's the link to your event: {link}"),
                        handle.event_link,
                    )
                }
                Err(error) => self.calendar_failure(error, "update").await,
            }
        } else {
            match self.calendar.delete_event(&target.id).await {
                Ok(()) => {
                    info!(event_id = %target.id, "deleted event");
                    DispatchOutcome::executed("Event deleted successfully!", None)
                }
                Err(error) => self.calendar_failure(error, "delete").await,
            }
        }
    }

    async fn query(&self, intent: &Intent) -> DispatchOutcome {
        match self.resolver.resolve(intent).await {
            Resolution::NoMatch => DispatchOutcome::no_match(NO_MATCH),
            Resolution::Failed { auth_required, .. } => {
                self.resolution_failure(auth_required).await
            }
            Resolution::Found(events) if events.len() == 1 => {
                let event = &events[0];
                DispatchOutcome::executed(
                    format!("You have \"{}\" starting at {}.", event.summary, event.start),
                    None,
                )
            }
            Resolution::Found(events) => DispatchOutcome::executed(
                format!("Here's what I found:\n{}", numbered_list(&events)),
                None,
            ),
        }
    }

    async fn calendar_failure(&self, error: CalendarError, operation: &str) -> DispatchOutcome {
        warn!(%error, operation, "calendar call failed");
        self.resolution_failure(error.is_auth_required()).await
    }

    /// Failure detail was logged at the call site; an empty error message
    /// makes the composer fall back to the apology text.
    async fn resolution_failure(&self, auth_required: bool) -> DispatchOutcome {
        if auth_required {
            return match self.calendar.auth_url().await {
                Ok(url) => DispatchOutcome::error(format!(
                    "Your Google account needs to be linked again. Please authenticate here: {url}"
                )),
                Err(error) => {
                    warn!(%error, "could not produce auth url");
                    DispatchOutcome::error("")
                }
            };
        }
        DispatchOutcome::error("")
    }
}

fn numbered_list(events: &[CandidateEvent]) -> String {
    events
        .iter()
        .enumerate()
        .map(|(idx, event)| format!("{}. {} - {}", idx + 1, event.summary, event.start))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedCalendar;
    use agendum_schema::DispatchStatus;
    use chrono::{NaiveDate, NaiveTime};

    fn intent(kind: IntentKind) -> Intent {
        Intent {
            kind,
            event_name: Some("Lunch".into()),
            date: Some(NaiveDate::from_ymd_opt(2024, 6, 11).unwrap()),
            start_time: Some(NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
            end_time: Some(NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
            description: None,
            participants: vec![],
            confirmation_needed: false,
            error: None,
        }
    }

    fn candidate(id: &str, summary: &str) -> CandidateEvent {
        CandidateEvent {
            id: id.into(),
            summary: summary.into(),
            start: "2024-06-11T12:00:00Z".into(),
            end: "2024-06-11T13:00:00Z".into(),
            participants: vec![],
            description: String::new(),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn create_executes_and_reports_the_link() {
        let calendar = ScriptedCalendar::with_events(vec![]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Create)).await;

        assert_eq!(outcome.status, DispatchStatus::Executed);
        assert!(outcome.message.contains("Event created successfully!"));
        assert!(outcome.message.contains("https://calendar.google.com/evt-created"));
        assert_eq!(calendar.create_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn confirmation_needed_blocks_all_calendar_calls() {
        let calendar = ScriptedCalendar::with_events(vec![]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let mut i = intent(IntentKind::Create);
        i.confirmation_needed = true;

        let outcome = dispatcher.dispatch(&i).await;
        assert_eq!(outcome.status, DispatchStatus::NeedsConfirmation);
        assert!(outcome.message.is_empty());
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn unknown_intent_asks_for_confirmation() {
        let calendar = ScriptedCalendar::with_events(vec![]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&Intent::unknown("timeout")).await;

        assert_eq!(outcome.status, DispatchStatus::NeedsConfirmation);
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn delete_with_no_candidates_is_no_match() {
        let calendar = ScriptedCalendar::with_events(vec![]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Delete)).await;

        assert_eq!(outcome.status, DispatchStatus::NoMatch);
        assert_eq!(outcome.message, "No matching events found.");
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn single_match_delete_mutates_exactly_once() {
        let calendar = ScriptedCalendar::with_events(vec![candidate("e1", "Lunch")]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Delete)).await;

        assert_eq!(outcome.status, DispatchStatus::Executed);
        assert_eq!(outcome.message, "Event deleted successfully!");
        assert_eq!(calendar.mutation_count(), 1);
    }

    #[tokio::test]
    async fn multi_match_delete_asks_to_disambiguate_without_mutating() {
        let calendar = ScriptedCalendar::with_events(vec![
            candidate("e1", "Lunch with Sam"),
            candidate("e2", "Lunch with Alex"),
        ]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Delete)).await;

        assert_eq!(outcome.status, DispatchStatus::NeedsConfirmation);
        assert!(outcome.message.contains("1. Lunch with Sam - 2024-06-11T12:00:00Z"));
        assert!(outcome.message.contains("2. Lunch with Alex"));
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn single_match_update_mutates_the_matched_event() {
        let calendar = ScriptedCalendar::with_events(vec![candidate("e7", "Lunch")]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Update)).await;

        assert_eq!(outcome.status, DispatchStatus::Executed);
        assert!(outcome.message.contains("https://calendar.google.com/e7"));
        assert_eq!(calendar.update_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_lists_every_candidate_without_mutating() {
        let calendar = ScriptedCalendar::with_events(vec![
            candidate("e1", "Standup"),
            candidate("e2", "Lunch"),
            candidate("e3", "Review"),
        ]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Query)).await;

        assert_eq!(outcome.status, DispatchStatus::Executed);
        for name in ["Standup", "Lunch", "Review"] {
            assert!(outcome.message.contains(name), "missing {name}");
        }
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn query_with_one_candidate_summarizes_it_directly() {
        let calendar = ScriptedCalendar::with_events(vec![candidate("e4", "Standup")]);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Query)).await;

        assert_eq!(outcome.status, DispatchStatus::Executed);
        assert!(outcome.message.contains("Standup"));
        assert!(!outcome.message.contains("1."));
        assert_eq!(calendar.mutation_count(), 0);
    }

    #[tokio::test]
    async fn auth_required_surfaces_the_consent_url() {
        let calendar = ScriptedCalendar::with_query_error(CalendarError::AuthRequired);
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Query)).await;

        assert_eq!(outcome.status, DispatchStatus::Error);
        assert!(outcome.message.contains("https://accounts.example.com/consent"));
    }

    #[tokio::test]
    async fn api_failure_yields_an_empty_error_for_the_composer() {
        let calendar = ScriptedCalendar::with_query_error(CalendarError::Api {
            status: 500,
            message: "backend unavailable".into(),
        });
        let dispatcher = ActionDispatcher::new(calendar.clone());
        let outcome = dispatcher.dispatch(&intent(IntentKind::Query)).await;

        assert_eq!(outcome.status, DispatchStatus::Error);
        assert!(outcome.message.is_empty());
    }
}
