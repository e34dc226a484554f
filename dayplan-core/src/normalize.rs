//! Validation and normalization of model-produced event candidates.
//!
//! The language model is treated as schema-violating in practice: replies
//! may use a bare array or an `{"events": [...]}` wrapper, times may come
//! back as RFC 3339, naive date-times, or bare clock times. Everything is
//! coerced into timezone-aware [`Event`]s anchored to the session's day, or
//! rejected loudly. Nothing is dropped silently.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::error::{PlanError, PlanResult};
use crate::event::Event;

/// Default duration when the model gives only one of start/end.
const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

/// A candidate event as the model returned it, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Non-fatal observations made while normalizing, surfaced to the caller
/// as warnings rather than hard failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// The candidate's local date differs from the session's target day.
    /// Legitimate for next-day spillover, but worth telling the user.
    OutsideTargetDay { summary: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeWarning::OutsideTargetDay { summary } => {
                write!(f, "'{}' falls outside the planned day", summary)
            }
        }
    }
}

/// Extract the candidate list from a raw model reply.
///
/// Accepts a bare JSON array or an object with an `events` array; anything
/// else is a schema violation. Entries must be objects with string fields.
pub fn parse_candidates(raw: &Value) -> PlanResult<Vec<RawCandidate>> {
    let items = match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("events") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(PlanError::SchemaViolation(format!(
                    "`events` must be an array, got {}",
                    json_type_name(other)
                )));
            }
            None => {
                return Err(PlanError::SchemaViolation(
                    "object reply has no `events` array".to_string(),
                ));
            }
        },
        other => {
            return Err(PlanError::SchemaViolation(format!(
                "expected an array of events, got {}",
                json_type_name(other)
            )));
        }
    };

    items
        .iter()
        .map(|item| {
            if !item.is_object() {
                return Err(PlanError::SchemaViolation(format!(
                    "event entry must be an object, got {}",
                    json_type_name(item)
                )));
            }
            serde_json::from_value(item.clone())
                .map_err(|e| PlanError::SchemaViolation(format!("malformed event entry: {e}")))
        })
        .collect()
}

/// Number of candidate entries in a raw reply, if it has a recognizable
/// list shape. Used by the pipeline's empty-response detection.
pub fn candidate_count(raw: &Value) -> Option<usize> {
    match raw {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => match map.get("events") {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize a whole candidate list against the session's day and timezone.
///
/// Any invalid candidate fails the round; per-candidate warnings are
/// collected and returned alongside the events.
pub fn normalize_candidates(
    candidates: &[RawCandidate],
    date: NaiveDate,
    tz: Tz,
) -> PlanResult<(Vec<Event>, Vec<NormalizeWarning>)> {
    let mut events = Vec::with_capacity(candidates.len());
    let mut warnings = Vec::new();
    for raw in candidates {
        let (event, mut event_warnings) = normalize(raw, date, tz)?;
        events.push(event);
        warnings.append(&mut event_warnings);
    }
    Ok((events, warnings))
}

/// Normalize a single candidate into a timezone-aware [`Event`].
pub fn normalize(
    raw: &RawCandidate,
    date: NaiveDate,
    tz: Tz,
) -> PlanResult<(Event, Vec<NormalizeWarning>)> {
    let summary = raw
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlanError::InvalidCandidate("candidate is missing a summary".to_string()))?
        .to_string();

    let start = raw
        .start
        .as_deref()
        .map(|s| parse_instant(s, date, tz))
        .transpose()?;
    let end = raw
        .end
        .as_deref()
        .map(|s| parse_instant(s, date, tz))
        .transpose()?;

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, start + Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES)),
        (None, Some(end)) => (end - Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES), end),
        (None, None) => {
            return Err(PlanError::InvalidCandidate(format!(
                "candidate '{summary}' has neither start nor end"
            )));
        }
    };

    if end <= start {
        return Err(PlanError::InvalidCandidate(format!(
            "candidate '{summary}' ends at or before it starts"
        )));
    }

    let mut warnings = Vec::new();
    if start.with_timezone(&tz).date_naive() != date {
        warnings.push(NormalizeWarning::OutsideTargetDay {
            summary: summary.clone(),
        });
    }

    Ok((Event::proposal(summary, start, end), warnings))
}

/// Parse a time expression into a UTC instant.
///
/// Tries RFC 3339 first, then naive date-times, then bare clock times
/// anchored to the session's day in the session's timezone.
fn parse_instant(s: &str, date: NaiveDate, tz: Tz) -> PlanResult<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PlanError::InvalidCandidate("empty time expression".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return anchor(naive, tz);
        }
    }

    // Bare clock times, e.g. "14:30", "7:00 pm", "7 pm"
    let upper = s.to_uppercase();
    const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I %p"];
    for fmt in TIME_FORMATS {
        // `NaiveTime::parse_from_str` rejects minute-less inputs like
        // "7 pm", so go through `Parsed` and default the minute to zero.
        let mut parsed = chrono::format::Parsed::new();
        if chrono::format::parse(&mut parsed, &upper, chrono::format::StrftimeItems::new(fmt))
            .is_err()
        {
            continue;
        }
        if parsed.minute().is_none() {
            let _ = parsed.set_minute(0);
        }
        if let Ok(time) = parsed.to_naive_time() {
            return anchor(date.and_time(time), tz);
        }
    }

    Err(PlanError::InvalidCandidate(format!(
        "unparseable time expression: '{s}'"
    )))
}

/// Anchor a naive local time to a timezone. Ambiguous local times (DST
/// fold) resolve to the earlier instant; nonexistent ones are rejected.
fn anchor(naive: NaiveDateTime, tz: Tz) -> PlanResult<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            PlanError::InvalidCandidate(format!("time {naive} does not exist in {tz}"))
        })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
