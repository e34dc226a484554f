//! Provider-neutral event types.
//!
//! These types represent calendar events in a provider-agnostic way. The
//! reconciliation engine works exclusively with them, and the server
//! serializes them (camelCase) straight to API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a proposed event relative to the calendar at the time of
/// the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Purely proposed, not yet on the calendar.
    New,
    /// Already on the calendar, untouched by the proposal.
    ExistingUnchanged,
    /// Already on the calendar, but the proposal moves it.
    ExistingModified,
}

/// A single entry of a proposed schedule.
///
/// Invariants: `start < end`; `original_start`/`original_end` are present
/// iff `source_kind == ExistingModified`, and always record the *earliest*
/// known ancestor time, never an intermediate proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source_kind: SourceKind,
    /// Present iff the event already exists in (or has been committed to)
    /// the calendar.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub calendar_event_id: Option<String>,
    /// Pre-revision start, so a client can render "moved from X to Y".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_end: Option<DateTime<Utc>>,
}

impl Event {
    /// A freshly proposed event, not yet tied to any calendar entry.
    pub fn proposal(summary: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Event {
            summary: summary.into(),
            start,
            end,
            source_kind: SourceKind::New,
            calendar_event_id: None,
            original_start: None,
            original_end: None,
        }
    }

    /// Carry an existing calendar event into a schedule unchanged.
    pub fn from_existing(existing: &ExistingEvent) -> Self {
        Event {
            summary: existing.summary.clone(),
            start: existing.start,
            end: existing.end,
            source_kind: SourceKind::ExistingUnchanged,
            calendar_event_id: Some(existing.id.clone()),
            original_start: None,
            original_end: None,
        }
    }

    /// Whether this entry still needs a calendar write at commit time.
    pub fn is_pending(&self) -> bool {
        self.calendar_event_id.is_none() || self.source_kind == SourceKind::ExistingModified
    }
}

/// Read-only projection of a calendar-provider event. Never mutated, only
/// compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An ordered sequence of events: the current working picture of one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub events: Vec<Event>,
}

impl Schedule {
    /// Build a schedule sorted by start time. The sort is stable, so equal
    /// starts keep their insertion order and output stays deterministic.
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.start);
        Schedule { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }
}
