//! Google Calendar gateway.
//!
//! Implements `CalendarGateway` over the Google Calendar v3 REST API. The
//! caller supplies an OAuth bearer token per request; acquiring and
//! refreshing tokens is someone else's job. All calls target the user's
//! primary calendar.

mod api;
mod convert;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use reqwest::StatusCode;

use dayplan_core::error::{PlanError, PlanResult};
use dayplan_core::event::{Event, ExistingEvent};
use dayplan_core::gateway::CalendarGateway;

use crate::api::{CalendarResource, EventList, GoogleEvent};
use crate::convert::{day_bounds, from_google_event, to_google_event};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct GoogleCalendarGateway {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarGateway {
    pub fn new() -> PlanResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the gateway at a different API root (used against fakes).
    ///
    /// Fails if the HTTP client cannot be built; a client without the
    /// request timeout must never be handed out.
    pub fn with_base_url(base_url: impl Into<String>) -> PlanResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;
        Ok(GoogleCalendarGateway {
            client,
            base_url: base_url.into(),
        })
    }

    async fn check(&self, response: reqwest::Response) -> PlanResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

fn status_error(status: StatusCode, body: &str) -> PlanError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PlanError::Auth(format!("calendar API returned {status}"))
        }
        _ => PlanError::ProviderUnavailable(format!("calendar API returned {status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> PlanError {
    PlanError::ProviderUnavailable(format!("calendar request failed: {err}"))
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn calendar_timezone(&self, credential: &str) -> PlanResult<Tz> {
        let response = self
            .client
            .get(format!("{}/calendars/primary", self.base_url))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(transport_error)?;
        let calendar: CalendarResource = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        match calendar.time_zone.as_deref().map(Tz::from_str) {
            Some(Ok(tz)) => Ok(tz),
            other => {
                // The original behavior: unknown or missing zone falls back
                // to UTC rather than failing the whole request.
                tracing::warn!(zone = ?other, "unrecognized calendar timezone, using UTC");
                Ok(chrono_tz::UTC)
            }
        }
    }

    async fn fetch_day(
        &self,
        date: NaiveDate,
        tz: Tz,
        credential: &str,
    ) -> PlanResult<Vec<ExistingEvent>> {
        let (start, end) = day_bounds(date, tz);
        let response = self
            .client
            .get(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(credential)
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        let list: EventList = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        let mut events: Vec<ExistingEvent> =
            list.items.iter().filter_map(from_google_event).collect();
        events.sort_by(|a, b| a.start.cmp(&b.start));
        tracing::debug!(count = events.len(), %date, "fetched calendar day");
        Ok(events)
    }

    async fn insert_event(&self, event: &Event, credential: &str) -> PlanResult<String> {
        let body = to_google_event(event);
        let response = self
            .client
            .post(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let created: GoogleEvent = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        created.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            PlanError::ProviderUnavailable("calendar API returned an event without an id".into())
        })
    }

    async fn update_event(&self, event: &Event, credential: &str) -> PlanResult<()> {
        let Some(id) = event.calendar_event_id.as_deref() else {
            return Err(PlanError::ProviderUnavailable(
                "cannot update an event without a calendar id".into(),
            ));
        };
        let body = to_google_event(event);
        let response = self
            .client
            .patch(format!("{}/calendars/primary/events/{}", self.base_url, id))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response).await?;
        Ok(())
    }
}
