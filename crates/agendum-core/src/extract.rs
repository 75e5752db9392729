use crate::prompts;
use agendum_provider::{LlmProvider, LlmRequest};
use agendum_schema::{Intent, IntentKind, Turn};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shape the model is asked to return. Everything is optional and stringly
/// typed here; validation into a typed `Intent` happens afterwards.
#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: Option<String>,
    #[serde(default)]
    event_name: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    participants: Vec<String>,
    #[serde(default)]
    confirmation_needed: bool,
}

/// Pulls a structured calendar intent out of the conversation. Fails safe:
/// any provider or validation failure yields an unknown intent that asks
/// for confirmation instead of reaching the calendar.
pub struct IntentExtractor {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl IntentExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn extract(&self, message: &str, history: &[Turn], now: DateTime<Utc>) -> Intent {
        let request = LlmRequest::json(
            self.model.clone(),
            Some(prompts::extraction_prompt(history, now)),
            message.to_string(),
        );

        let text = match self.provider.complete(request).await {
            Ok(resp) => resp.text,
            Err(error) => {
                warn!(%error, "intent extraction call failed");
                return Intent::unknown(error.to_string());
            }
        };

        let raw: RawIntent = match serde_json::from_str(crate::strip_code_fences(&text)) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, raw = %text, "unparseable intent payload");
                return Intent::unknown(format!("invalid intent payload: {error}"));
            }
        };

        match validate(raw) {
            Ok(intent) => {
                debug!(kind = ?intent.kind, "extracted intent");
                intent
            }
            Err(reason) => {
                warn!(%reason, "intent validation failed");
                Intent::unknown(reason)
            }
        }
    }
}

fn validate(raw: RawIntent) -> Result<Intent, String> {
    let kind = match raw.intent.as_deref() {
        Some("create") => IntentKind::Create,
        Some("update") => IntentKind::Update,
        Some("delete") => IntentKind::Delete,
        Some("query") => IntentKind::Query,
        Some(other) => return Err(format!("unrecognized intent '{other}'")),
        None => return Err("missing intent field".to_string()),
    };

    let date = match raw.date.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date '{s}'"))?,
        ),
        None => None,
    };

    Ok(Intent {
        kind,
        event_name: raw.event_name.filter(|s| !s.is_empty()),
        date,
        start_time: parse_time(raw.start_time.as_deref())?,
        end_time: parse_time(raw.end_time.as_deref())?,
        description: raw.description.filter(|s| !s.is_empty()),
        participants: raw.participants,
        confirmation_needed: raw.confirmation_needed,
        error: None,
    })
}

fn parse_time(value: Option<&str>) -> Result<Option<NaiveTime>, String> {
    let Some(s) = value.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map(Some)
        .map_err(|_| format!("invalid time '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedProvider;

    fn extractor(reply: &str) -> IntentExtractor {
        IntentExtractor::new(ScriptedProvider::replies(vec![reply.into()]), "test-model")
    }

    #[tokio::test]
    async fn extracts_a_complete_create_intent() {
        let x = extractor(
            r#"{"intent": "create", "event_name": "Lunch with Sam", "date": "2024-06-11",
                "start_time": "12:00", "end_time": "13:00", "participants": ["sam@example.com"],
                "confirmation_needed": false}"#,
        );
        let intent = x.extract("Schedule lunch with Sam tomorrow", &[], Utc::now()).await;

        assert_eq!(intent.kind, IntentKind::Create);
        assert_eq!(intent.event_name.as_deref(), Some("Lunch with Sam"));
        assert_eq!(intent.date, NaiveDate::from_ymd_opt(2024, 6, 11));
        assert_eq!(intent.start_time, NaiveTime::from_hms_opt(12, 0, 0));
        assert!(!intent.confirmation_needed);
        assert!(intent.error.is_none());
    }

    #[tokio::test]
    async fn provider_failure_yields_unknown_with_confirmation() {
        let x = IntentExtractor::new(ScriptedProvider::failing("timeout"), "test-model");
        let intent = x.extract("Schedule lunch", &[], Utc::now()).await;

        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.confirmation_needed);
        assert!(intent.error.as_deref().unwrap_or("").contains("timeout"));
    }

    #[tokio::test]
    async fn malformed_json_yields_unknown() {
        let x = extractor("I think you want to schedule lunch!");
        let intent = x.extract("Schedule lunch", &[], Utc::now()).await;
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.confirmation_needed);
    }

    #[tokio::test]
    async fn bad_date_yields_unknown() {
        let x = extractor(r#"{"intent": "create", "date": "next tuesday"}"#);
        let intent = x.extract("Schedule lunch", &[], Utc::now()).await;
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.error.as_deref().unwrap_or("").contains("invalid date"));
    }

    #[tokio::test]
    async fn unrecognized_intent_kind_yields_unknown() {
        let x = extractor(r#"{"intent": "reschedule"}"#);
        let intent = x.extract("Move my meeting", &[], Utc::now()).await;
        assert_eq!(intent.kind, IntentKind::Unknown);
    }

    #[tokio::test]
    async fn seconds_precision_times_are_accepted() {
        let x = extractor(r#"{"intent": "query", "date": "2024-06-11", "start_time": "09:00:00"}"#);
        let intent = x.extract("What's at nine?", &[], Utc::now()).await;
        assert_eq!(intent.kind, IntentKind::Query);
        assert_eq!(intent.start_time, NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[tokio::test]
    async fn empty_strings_are_treated_as_absent() {
        let x = extractor(r#"{"intent": "query", "event_name": "", "date": "", "start_time": ""}"#);
        let intent = x.extract("Show my schedule", &[], Utc::now()).await;
        assert_eq!(intent.kind, IntentKind::Query);
        assert!(intent.event_name.is_none());
        assert!(intent.date.is_none());
    }
}
