//! Calendar tools for the TailorTalk agent.
//!
//! Two tools are exposed to the reasoning service:
//! - `check_calendar_availability`: busy slots within a time range
//! - `create_calendar_event`: insert an event
//!
//! Both normalize their timestamps into the calendar's timezone before
//! touching the backend, and report every failure as result text.

pub mod availability;
pub mod create_event;

use tailortalk_calendar::CalendarBinding;
use tailortalk_core::tool::ToolRegistry;

pub use availability::CheckAvailabilityTool;
pub use create_event::CreateEventTool;

/// Create the registry of calendar tools bound to one calendar.
pub fn default_registry(calendar: CalendarBinding) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CheckAvailabilityTool::new(calendar.clone())));
    registry.register(Box::new(CreateEventTool::new(calendar)));
    registry
}
