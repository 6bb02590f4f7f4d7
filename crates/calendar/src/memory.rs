//! In-memory calendar backend.
//!
//! Holds events in a vector behind a mutex. Used for local runs without
//! Google credentials and as the calendar in tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use tailortalk_core::error::CalendarError;
use tokio::sync::Mutex;

use crate::client::{BusyInterval, CalendarService, CreatedEvent, NewEvent};

#[derive(Debug, Clone)]
struct StoredEvent {
    id: String,
    event: NewEvent,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

#[derive(Default)]
pub struct InMemoryCalendar {
    calendars: Mutex<HashMap<String, Vec<StoredEvent>>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event inserted into `calendar_id`, in insertion order.
    pub async fn events(&self, calendar_id: &str) -> Vec<NewEvent> {
        self.calendars
            .lock()
            .await
            .get(calendar_id)
            .map(|events| events.iter().map(|e| e.event.clone()).collect())
            .unwrap_or_default()
    }

    /// Look up one event by the id `insert_event` returned.
    pub async fn event(&self, calendar_id: &str, event_id: &str) -> Option<NewEvent> {
        self.calendars
            .lock()
            .await
            .get(calendar_id)?
            .iter()
            .find(|e| e.id == event_id)
            .map(|e| e.event.clone())
    }
}

fn parse(ts: &str) -> Result<DateTime<FixedOffset>, CalendarError> {
    DateTime::parse_from_rfc3339(ts).map_err(|_| CalendarError::InvalidTimestamp(ts.to_string()))
}

#[async_trait]
impl CalendarService for InMemoryCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let min = parse(time_min)?;
        let max = parse(time_max)?;

        let calendars = self.calendars.lock().await;
        let mut hits: Vec<&StoredEvent> = calendars
            .get(calendar_id)
            .map(|events| events.iter().filter(|e| e.start < max && e.end > min).collect())
            .unwrap_or_default();
        hits.sort_by_key(|e| e.start);

        Ok(hits
            .into_iter()
            .map(|e| BusyInterval {
                start: e.event.start.clone(),
                end: e.event.end.clone(),
            })
            .collect())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<CreatedEvent, CalendarError> {
        let start = parse(&event.start)?;
        let end = parse(&event.end)?;

        let mut calendars = self.calendars.lock().await;
        let events = calendars.entry(calendar_id.to_string()).or_default();
        let id = format!("evt{}", events.len() + 1);
        events.push(StoredEvent {
            id: id.clone(),
            event: event.clone(),
            start,
            end,
        });

        tracing::debug!(calendar_id, event_id = %id, "Stored in-memory event");
        Ok(CreatedEvent {
            html_link: Some(format!("memory://{calendar_id}/{id}")),
            id,
        })
    }
}
