//! System instruction sent ahead of every reasoning step.

use chrono::{DateTime, Utc};
use tailortalk_calendar::Tz;

/// How the instruction for a reasoning step is produced.
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    /// Send no instruction; the model sees only the history.
    None,
    /// A fixed instruction from configuration.
    Fixed(String),
    /// The built-in booking instruction, stamped with the current local
    /// date so the model can resolve "tomorrow" and weekdays.
    CalendarAssistant { timezone: Tz },
}

impl SystemPrompt {
    pub fn render(&self, now: DateTime<Utc>) -> Option<String> {
        match self {
            Self::None => None,
            Self::Fixed(text) => Some(text.clone()),
            Self::CalendarAssistant { timezone } => Some(calendar_assistant(*timezone, now)),
        }
    }
}

fn calendar_assistant(timezone: Tz, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&timezone);
    format!(
        "You are TailorTalk, an assistant that books meetings on the user's Google Calendar.\n\
         The current date and time is {} ({}). All times the user mentions are in {} unless \
         they say otherwise.\n\
         Use check_calendar_availability before proposing or booking a slot, and only call \
         create_calendar_event once the user has agreed to a specific time.\n\
         Pass every timestamp to the tools in ISO 8601 format, for example {}.\n\
         Answer briefly and confirm the booked time after creating an event.",
        local.format("%A, %Y-%m-%d %H:%M"),
        local.format("%:z"),
        timezone.name(),
        local.format("%Y-%m-%dT15:00:00"),
    )
}
