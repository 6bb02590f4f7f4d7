//! Calendar service contract and the Google Calendar v3 client.

use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tailortalk_core::error::CalendarError;
use tracing::{debug, warn};

use crate::auth::TokenProvider;

/// A time range occupied by an existing event.
///
/// Timed events report ISO 8601 timestamps; all-day events report dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: String,
    pub end: String,
}

/// An event to insert. `start`/`end` must already be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

/// The calendar backend as seen by the tools.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Busy intervals between `time_min` and `time_max`, recurring events
    /// expanded, ordered by start time.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<CreatedEvent, CalendarError>;
}

/// REST client for the Google Calendar v3 API.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    timezone: Tz,
    tokens: Arc<dyn TokenProvider>,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        timezone: Tz,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Network(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timezone,
            tokens,
        })
    }

    /// `{base}/calendars/{calendar_id}/events`, with the id percent-encoded.
    fn events_url(&self, calendar_id: &str) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CalendarError::Network(format!("invalid calendar API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Network("calendar API URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, CalendarError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await.map_err(map_transport)?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::AuthenticationFailed(body));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Calendar API returned error");
            return Err(CalendarError::Api {
                status_code: status,
                message: body,
            });
        }
        Ok(response)
    }
}

fn map_transport(e: reqwest::Error) -> CalendarError {
    if e.is_timeout() {
        CalendarError::Timeout(e.to_string())
    } else {
        CalendarError::Network(e.to_string())
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let url = self.events_url(calendar_id)?;
        let mut busy = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![
                ("timeMin", time_min),
                ("timeMax", time_max),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("timeZone", self.timezone.name()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self.send(self.http.get(url.clone()).query(&query)).await?;
            let page: ApiEventList = response
                .json()
                .await
                .map_err(|e| CalendarError::MalformedResponse(e.to_string()))?;

            busy.extend(page.items.iter().filter_map(ApiEvent::busy_interval));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = busy.len(), "Listed calendar events");
        Ok(busy)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<CreatedEvent, CalendarError> {
        let url = self.events_url(calendar_id)?;
        let body = ApiEventInsert {
            summary: &event.summary,
            description: &event.description,
            start: ApiDateTime {
                date_time: &event.start,
                time_zone: self.timezone.name(),
            },
            end: ApiDateTime {
                date_time: &event.end,
                time_zone: self.timezone.name(),
            },
        };

        let response = self.send(self.http.post(url).json(&body)).await?;
        let created: ApiEvent = response
            .json()
            .await
            .map_err(|e| CalendarError::MalformedResponse(e.to_string()))?;

        debug!(calendar_id, event_id = %created.id, "Inserted calendar event");
        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }
}

// --- Calendar API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    html_link: Option<String>,
    #[serde(default)]
    start: Option<ApiEventTime>,
    #[serde(default)]
    end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl ApiEventTime {
    fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

impl ApiEvent {
    fn busy_interval(&self) -> Option<BusyInterval> {
        let start = self.start.as_ref()?.value()?;
        let end = self.end.as_ref()?.value()?;
        Some(BusyInterval {
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventInsert<'a> {
    summary: &'a str,
    description: &'a str,
    start: ApiDateTime<'a>,
    end: ApiDateTime<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateTime<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}
