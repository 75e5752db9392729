//! Google Calendar v3 HTTP client.
//!
//! https://developers.google.com/calendar/api/v3/reference

use std::time::Duration;

use agendum_schema::CandidateEvent;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::oauth::{self, OAuthConfig, GOOGLE_TOKEN_URL};
use crate::token::{StoredToken, TokenStore};
use crate::{CalendarError, CalendarStore, EventDraft, EventHandle, EventQuery};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const OAUTH_CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

pub struct GoogleCalendar {
    http: reqwest::Client,
    api_base: String,
    token_url: String,
    oauth: OAuthConfig,
    tokens: TokenStore,
    current: Mutex<Option<StoredToken>>,
    pending_auth: Mutex<Option<PendingAuth>>,
}

/// An outstanding consent flow whose callback listener holds the port.
struct PendingAuth {
    url: String,
    listener: tokio::task::JoinHandle<()>,
}

impl GoogleCalendar {
    pub fn new(oauth: OAuthConfig, tokens: TokenStore) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_base: CALENDAR_API_BASE.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            oauth,
            tokens,
            current: Mutex::new(None),
            pending_auth: Mutex::new(None),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Current access token, refreshing through the refresh token when the
    /// cached one has expired. A failed refresh clears the stored token so
    /// the user is sent back through the consent flow.
    async fn access_token(&self) -> Result<String, CalendarError> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self
                .tokens
                .load()
                .await
                .map_err(|e| CalendarError::Invalid(e.to_string()))?;
        }

        let Some(token) = current.clone() else {
            return Err(CalendarError::AuthRequired);
        };

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.as_deref() else {
            *current = None;
            let _ = self.tokens.clear().await;
            return Err(CalendarError::AuthRequired);
        };

        match oauth::refresh_access_token(&self.http, &self.oauth, &self.token_url, refresh_token)
            .await
        {
            Ok(refreshed) => {
                if let Err(error) = self.tokens.save(&refreshed).await {
                    warn!(%error, "failed to persist refreshed token");
                }
                let access = refreshed.access_token.clone();
                *current = Some(refreshed);
                info!("refreshed expired google credentials");
                Ok(access)
            }
            Err(error) => {
                warn!(%error, "token refresh failed, forcing re-authentication");
                *current = None;
                let _ = self.tokens.clear().await;
                Err(CalendarError::AuthRequired)
            }
        }
    }

    async fn api_error(resp: reqwest::Response) -> CalendarError {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return CalendarError::AuthRequired;
        }
        let message = resp.text().await.unwrap_or_default();
        CalendarError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Calendar's configured timezone, defaulting to UTC when the settings
    /// call fails for any reason.
    async fn user_timezone(&self, access_token: &str) -> String {
        let url = format!("{}/users/me/settings/timezone", self.api_base);
        let result = async {
            let resp = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .send()
                .await?;
            resp.error_for_status()?
                .json::<TimezoneSetting>()
                .await
                .map(|s| s.value)
        }
        .await;

        match result {
            Ok(tz) => tz,
            Err(error) => {
                warn!(%error, "failed to fetch user timezone, defaulting to UTC");
                "UTC".to_string()
            }
        }
    }
}

/// Attendees are only forwarded when they look like an email address.
fn attendee_list(participants: &[String]) -> Vec<serde_json::Value> {
    participants
        .iter()
        .filter(|p| p.contains('@'))
        .map(|p| json!({ "email": p }))
        .collect()
}

/// Exact-day UTC query window for a date filter.
fn day_window(date: NaiveDate) -> (String, String) {
    (
        format!("{date}T00:00:00Z"),
        format!("{date}T23:59:59Z"),
    )
}

fn event_to_candidate(item: &serde_json::Value) -> CandidateEvent {
    let time_of = |field: &str| {
        item[field]["dateTime"]
            .as_str()
            .or_else(|| item[field]["date"].as_str())
            .unwrap_or_default()
            .to_string()
    };

    CandidateEvent {
        id: item["id"].as_str().unwrap_or_default().to_string(),
        summary: item["summary"].as_str().unwrap_or("No Title").to_string(),
        start: time_of("start"),
        end: time_of("end"),
        participants: item["attendees"]
            .as_array()
            .map(|attendees| {
                attendees
                    .iter()
                    .filter_map(|a| a["email"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        description: item["description"].as_str().unwrap_or_default().to_string(),
        link: item["htmlLink"].as_str().unwrap_or_default().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TimezoneSetting {
    value: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[async_trait]
impl CalendarStore for GoogleCalendar {
    async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_ok()
    }

    async fn auth_url(&self) -> Result<String, CalendarError> {
        let mut pending = self.pending_auth.lock().await;

        // An earlier consent flow may still hold the callback port. Its
        // listener only accepts the state it was started with, so every
        // reply must carry that same URL until the flow resolves.
        if let Some(active) = pending.as_ref() {
            if !active.listener.is_finished() {
                return Ok(active.url.clone());
            }
        }

        let state = oauth::new_state();
        let url = oauth::authorization_url(&self.oauth, &state);

        // Complete the flow in the background: the chat reply carries the
        // URL, and whenever the user finishes consent the exchanged token
        // lands in the store.
        let http = self.http.clone();
        let config = self.oauth.clone();
        let token_url = self.token_url.clone();
        let tokens = self.tokens.clone();
        let port = self.oauth.callback_port;
        let listener = tokio::spawn(async move {
            let callback =
                match oauth::wait_for_oauth_callback(state, port, OAUTH_CALLBACK_TIMEOUT).await {
                    Ok(cb) => cb,
                    Err(error) => {
                        warn!(%error, "oauth callback never completed");
                        return;
                    }
                };
            match oauth::exchange_code(&http, &config, &token_url, &callback.code).await {
                Ok(token) => {
                    if let Err(error) = tokens.save(&token).await {
                        error!(%error, "failed to persist exchanged token");
                    } else {
                        info!("google account linked");
                    }
                }
                Err(error) => error!(%error, "oauth code exchange failed"),
            }
        });

        *pending = Some(PendingAuth {
            url: url.clone(),
            listener,
        });
        Ok(url)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<EventHandle, CalendarError> {
        let (Some(date), Some(start), Some(end)) = (draft.date, draft.start_time, draft.end_time)
        else {
            return Err(CalendarError::Invalid(
                "event date, start time, and end time are required".to_string(),
            ));
        };

        let access_token = self.access_token().await?;
        let timezone = self.user_timezone(&access_token).await;

        let mut event = json!({
            "summary": draft.summary.as_deref().unwrap_or("Untitled Event"),
            "description": draft.description.as_deref().unwrap_or(""),
            "start": {
                "dateTime": format!("{date}T{}", start.format("%H:%M:%S")),
                "timeZone": timezone,
            },
            "end": {
                "dateTime": format!("{date}T{}", end.format("%H:%M:%S")),
                "timeZone": timezone,
            },
        });

        let attendees = attendee_list(&draft.participants);
        if !attendees.is_empty() {
            event["attendees"] = json!(attendees);
        }

        let url = format!("{}/calendars/primary/events", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&event)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        let created: CreatedEvent = resp.json().await?;
        info!(event_id = %created.id, "created calendar event");
        Ok(EventHandle {
            event_id: created.id,
            event_link: created.html_link,
        })
    }

    async fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<EventHandle, CalendarError> {
        let access_token = self.access_token().await?;
        let url = format!("{}/calendars/primary/events/{event_id}", self.api_base);

        // Read-modify-write: only the fields present in the draft change.
        let resp = self.http.get(&url).bearer_auth(&access_token).send().await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        let mut event: serde_json::Value = resp.json().await?;

        if let Some(summary) = &draft.summary {
            event["summary"] = json!(summary);
        }
        if let Some(description) = &draft.description {
            event["description"] = json!(description);
        }
        if let (Some(date), Some(start)) = (draft.date, draft.start_time) {
            event["start"]["dateTime"] = json!(format!("{date}T{}", start.format("%H:%M:%S")));
        }
        if let (Some(date), Some(end)) = (draft.date, draft.end_time) {
            event["end"]["dateTime"] = json!(format!("{date}T{}", end.format("%H:%M:%S")));
        }

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&access_token)
            .json(&event)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        let updated: CreatedEvent = resp.json().await?;
        info!(event_id = %updated.id, "updated calendar event");
        Ok(EventHandle {
            event_id: updated.id,
            event_link: updated.html_link,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let access_token = self.access_token().await?;
        let url = format!("{}/calendars/primary/events/{event_id}", self.api_base);

        let resp = self
            .http
            .delete(&url)
            .bearer_auth(&access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        info!(%event_id, "deleted calendar event");
        Ok(())
    }

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<CandidateEvent>, CalendarError> {
        let access_token = self.access_token().await?;
        let url = format!("{}/calendars/primary/events", self.api_base);

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[("singleEvents", "true"), ("orderBy", "startTime")]);

        if let Some(date) = query.date {
            let (time_min, time_max) = day_window(date);
            request = request.query(&[("timeMin", time_min), ("timeMax", time_max)]);
        }
        if let Some(name) = query.event_name.as_deref().filter(|n| !n.is_empty()) {
            request = request.query(&[("q", name)]);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        let body: EventList = resp.json().await?;
        Ok(body.items.iter().map(event_to_candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_window_spans_the_whole_day_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 11).unwrap();
        let (min, max) = day_window(date);
        assert_eq!(min, "2024-06-11T00:00:00Z");
        assert_eq!(max, "2024-06-11T23:59:59Z");
    }

    #[test]
    fn attendee_list_filters_non_emails() {
        let attendees = attendee_list(&[
            "sam@example.com".to_string(),
            "Sam".to_string(),
            "ana@example.org".to_string(),
        ]);
        assert_eq!(attendees.len(), 2);
        assert_eq!(attendees[0]["email"], "sam@example.com");
    }

    #[test]
    fn event_to_candidate_prefers_date_time_over_date() {
        let item = json!({
            "id": "e1",
            "summary": "Standup",
            "start": {"dateTime": "2024-06-11T09:00:00Z"},
            "end": {"date": "2024-06-11"},
            "attendees": [{"email": "sam@example.com"}, {"displayName": "no email"}],
            "htmlLink": "https://calendar.google.com/event?eid=e1"
        });
        let event = event_to_candidate(&item);
        assert_eq!(event.start, "2024-06-11T09:00:00Z");
        assert_eq!(event.end, "2024-06-11");
        assert_eq!(event.participants, vec!["sam@example.com".to_string()]);
        assert_eq!(event.link, "https://calendar.google.com/event?eid=e1");
    }

    #[test]
    fn event_to_candidate_defaults_missing_summary() {
        let event = event_to_candidate(&json!({
            "id": "e2",
            "start": {"date": "2024-06-11"},
            "end": {"date": "2024-06-12"}
        }));
        assert_eq!(event.summary, "No Title");
        assert!(event.participants.is_empty());
    }
}
