//! Calendar availability lookup.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tailortalk_calendar::{BusyInterval, CalendarBinding};
use tailortalk_core::error::ToolError;
use tailortalk_core::tool::{Tool, parse_arguments};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    start_time: String,
    end_time: String,
}

/// Lists the busy slots of the bound calendar within a time range.
pub struct CheckAvailabilityTool {
    calendar: CalendarBinding,
}

impl CheckAvailabilityTool {
    pub fn new(calendar: CalendarBinding) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_calendar_availability"
    }

    fn description(&self) -> &str {
        "Checks for free slots in the Google Calendar within a given time range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "The start of the time range to check for availability, in ISO 8601 format."
                },
                "end_time": {
                    "type": "string",
                    "description": "The end of the time range to check for availability, in ISO 8601 format."
                }
            },
            "required": ["start_time", "end_time"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: AvailabilityArgs = parse_arguments(arguments)?;
        let time_min = self.calendar.normalize(&args.start_time)?;
        let time_max = self.calendar.normalize(&args.end_time)?;
        ensure_ordered(&time_min, &time_max)?;

        debug!(%time_min, %time_max, "Checking calendar availability");
        let busy = self
            .calendar
            .service
            .list_events(&self.calendar.calendar_id, &time_min, &time_max)
            .await?;

        if busy.is_empty() {
            return Ok(format!(
                "The calendar is completely free between {} and {}.",
                args.start_time, args.end_time
            ));
        }
        Ok(format!(
            "The following time slots are busy: {}. All other times are free.",
            format_busy(&busy)
        ))
    }
}

/// Both inputs are already normalized RFC 3339 strings.
pub(crate) fn ensure_ordered(start: &str, end: &str) -> Result<(), ToolError> {
    let (Ok(s), Ok(e)) = (DateTime::parse_from_rfc3339(start), DateTime::parse_from_rfc3339(end))
    else {
        return Ok(());
    };
    if e < s {
        return Err(ToolError::InvalidArguments(format!(
            "end_time {end} is before start_time {start}"
        )));
    }
    Ok(())
}

fn format_busy(busy: &[BusyInterval]) -> String {
    busy.iter()
        .map(|slot| format!("{} to {}", slot.start, slot.end))
        .collect::<Vec<_>>()
        .join(", ")
}
