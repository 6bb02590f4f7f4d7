//! Calendar event creation.

use async_trait::async_trait;
use serde::Deserialize;
use tailortalk_calendar::{CalendarBinding, NewEvent};
use tailortalk_core::error::ToolError;
use tailortalk_core::tool::{Tool, parse_arguments};
use tracing::info;

use crate::availability::ensure_ordered;

#[derive(Debug, Deserialize)]
struct CreateEventArgs {
    summary: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    description: String,
}

pub struct CreateEventTool {
    calendar: CalendarBinding,
}

impl CreateEventTool {
    pub fn new(calendar: CalendarBinding) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_calendar_event"
    }

    fn description(&self) -> &str {
        "Creates a new event in the Google Calendar"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "The title or summary of the event."
                },
                "start_time": {
                    "type": "string",
                    "description": "The start time of the event in ISO 8601 format."
                },
                "end_time": {
                    "type": "string",
                    "description": "The end time of the event in ISO 8601 format."
                },
                "description": {
                    "type": "string",
                    "description": "A brief description of the event.",
                    "default": ""
                }
            },
            "required": ["summary", "start_time", "end_time"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: CreateEventArgs = parse_arguments(arguments)?;
        let event = NewEvent {
            summary: args.summary,
            description: args.description,
            start: self.calendar.normalize(&args.start_time)?,
            end: self.calendar.normalize(&args.end_time)?,
        };
        ensure_ordered(&event.start, &event.end)?;

        let created = self
            .calendar
            .service
            .insert_event(&self.calendar.calendar_id, &event)
            .await?;

        info!(event_id = %created.id, summary = %event.summary, "Calendar event created");
        let link = created.html_link.as_deref().unwrap_or("(no link returned)");
        Ok(format!("Success! Event created. View it here: {link}"))
    }
}
