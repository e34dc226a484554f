//! Capability boundary for the external calendar provider.

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::error::PlanResult;
use crate::event::{Event, ExistingEvent};

/// Thin wrapper around the calendar provider.
///
/// Implementations are stateless I/O adapters; they never touch session
/// state. Errors map into the `PlanError` taxonomy: `Auth` for a rejected
/// credential (the caller must re-authenticate, it is not retried here),
/// `ProviderUnavailable` for transport and backend failures.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Timezone the user's calendar is anchored to.
    async fn calendar_timezone(&self, credential: &str) -> PlanResult<Tz>;

    /// All events on the given day, ordered by start time.
    async fn fetch_day(
        &self,
        date: NaiveDate,
        tz: Tz,
        credential: &str,
    ) -> PlanResult<Vec<ExistingEvent>>;

    /// Create a new calendar event; returns the provider-assigned id.
    /// Idempotent at the provider when retried with the same logical event.
    async fn insert_event(&self, event: &Event, credential: &str) -> PlanResult<String>;

    /// Rewrite an already-committed event (summary and times) in place.
    async fn update_event(&self, event: &Event, credential: &str) -> PlanResult<()>;
}
