//! Calendar backend for TailorTalk.
//!
//! - [`time`]: timestamp normalization into the configured zone
//! - [`auth`]: bearer tokens from a static token or a service account
//! - [`client`]: the [`CalendarService`] contract and its Google implementation
//! - [`memory`]: an in-process calendar for credential-free runs
//!
//! [`build_from_config`] loads credentials once and returns a
//! [`CalendarBinding`] that every session shares.

pub mod auth;
pub mod client;
pub mod memory;
pub mod time;

use std::sync::Arc;
use std::time::Duration;
use tailortalk_config::CalendarConfig;
use tailortalk_core::error::CalendarError;

pub use auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider};
pub use chrono_tz::Tz;
pub use client::{BusyInterval, CalendarService, CreatedEvent, GoogleCalendarClient, NewEvent};
pub use memory::InMemoryCalendar;
pub use time::{normalize_timestamp, parse_timezone};

/// A calendar service bound to one calendar and timezone.
#[derive(Clone)]
pub struct CalendarBinding {
    pub service: Arc<dyn CalendarService>,
    pub calendar_id: String,
    pub timezone: Tz,
}

impl CalendarBinding {
    pub fn new(service: Arc<dyn CalendarService>, calendar_id: impl Into<String>, timezone: Tz) -> Self {
        Self {
            service,
            calendar_id: calendar_id.into(),
            timezone,
        }
    }

    /// Normalize a timestamp into this binding's zone.
    pub fn normalize(&self, input: &str) -> Result<String, CalendarError> {
        normalize_timestamp(input, self.timezone)
    }
}

impl std::fmt::Debug for CalendarBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarBinding")
            .field("calendar_id", &self.calendar_id)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

/// Build the token source from configuration.
///
/// A configured `access_token` wins; otherwise the service-account key file
/// must exist and parse.
pub fn token_provider_from_config(
    config: &CalendarConfig,
) -> Result<Arc<dyn TokenProvider>, CalendarError> {
    if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
        tracing::info!("Using configured calendar access token");
        return Ok(Arc::new(StaticTokenProvider::new(token)));
    }

    let key = ServiceAccountKey::from_file(&config.credentials_file)?;
    let provider = ServiceAccountTokenProvider::new(
        key,
        auth::CALENDAR_SCOPE,
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

/// Build the configured calendar backend.
///
/// For the `google` backend credentials are loaded here, once.
pub fn build_from_config(config: &CalendarConfig) -> Result<CalendarBinding, CalendarError> {
    let timezone = parse_timezone(&config.timezone)?;

    if config.backend == "memory" {
        tracing::warn!("Using in-memory calendar; events are not persisted");
        return Ok(CalendarBinding::new(
            Arc::new(InMemoryCalendar::new()),
            &config.calendar_id,
            timezone,
        ));
    }

    let tokens = token_provider_from_config(config)?;
    let client = GoogleCalendarClient::new(
        &config.api_url,
        timezone,
        tokens,
        Duration::from_secs(config.timeout_secs),
    )?;

    tracing::info!(
        calendar_id = %config.calendar_id,
        timezone = %timezone,
        "Calendar backend ready"
    );
    Ok(CalendarBinding::new(Arc::new(client), &config.calendar_id, timezone))
}
