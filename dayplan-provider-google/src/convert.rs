//! Conversions between Google wire events and dayplan types.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use dayplan_core::event::{Event, ExistingEvent};

use crate::api::{GoogleEvent, GoogleEventTime};

/// UTC bounds of one calendar day in the given timezone.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_midnight(date, tz), local_midnight(next_day(date), tz))
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a DST jump: the day starts when clocks resume.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// Project a Google event into the read-only `ExistingEvent` shape.
///
/// Cancelled events and all-day events are skipped: the former are gone,
/// and the latter occupy no time slot the planner could collide with.
pub fn from_google_event(event: &GoogleEvent) -> Option<ExistingEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    let id = event.id.as_deref().filter(|id| !id.is_empty())?;
    let start = timed_instant(event.start.as_ref()?)?;
    let end = timed_instant(event.end.as_ref()?)?;

    Some(ExistingEvent {
        id: id.to_string(),
        summary: event
            .summary
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(No title)".to_string()),
        start,
        end,
    })
}

fn timed_instant(time: &GoogleEventTime) -> Option<DateTime<Utc>> {
    let raw = time.date_time.as_deref()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build the write body for insert and update calls.
pub fn to_google_event(event: &Event) -> GoogleEvent {
    GoogleEvent {
        id: None, // Google assigns ids; updates carry the id in the URL
        summary: Some(event.summary.clone()),
        status: None,
        start: Some(GoogleEventTime {
            date_time: Some(event.start.to_rfc3339()),
            date: None,
        }),
        end: Some(GoogleEventTime {
            date_time: Some(event.end.to_rfc3339()),
            date: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn google_event(id: &str, summary: &str, start: &str, end: &str) -> GoogleEvent {
        GoogleEvent {
            id: Some(id.to_string()),
            summary: Some(summary.to_string()),
            status: Some("confirmed".to_string()),
            start: Some(GoogleEventTime {
                date_time: Some(start.to_string()),
                date: None,
            }),
            end: Some(GoogleEventTime {
                date_time: Some(end.to_string()),
                date: None,
            }),
        }
    }

    #[test]
    fn timed_events_convert_with_utc_instants() {
        let event = google_event(
            "abc",
            "Standup",
            "2026-03-02T09:00:00-05:00",
            "2026-03-02T09:30:00-05:00",
        );
        let existing = from_google_event(&event).unwrap();
        assert_eq!(existing.id, "abc");
        assert_eq!(existing.summary, "Standup");
        assert_eq!(
            existing.start,
            Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let mut event = google_event("abc", "Gone", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        event.status = Some("cancelled".to_string());
        assert!(from_google_event(&event).is_none());
    }

    #[test]
    fn all_day_events_are_skipped() {
        let event = GoogleEvent {
            id: Some("abc".to_string()),
            summary: Some("Vacation".to_string()),
            status: Some("confirmed".to_string()),
            start: Some(GoogleEventTime {
                date_time: None,
                date: Some("2026-03-02".to_string()),
            }),
            end: Some(GoogleEventTime {
                date_time: None,
                date: Some("2026-03-03".to_string()),
            }),
        };
        assert!(from_google_event(&event).is_none());
    }

    #[test]
    fn untitled_events_get_a_placeholder_summary() {
        let mut event = google_event("abc", "", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        event.summary = None;
        assert_eq!(from_google_event(&event).unwrap().summary, "(No title)");
    }

    #[test]
    fn day_bounds_cover_the_local_day() {
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), New_York);
        // EST is UTC-5 in early March.
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 3, 5, 0, 0).unwrap());
    }

    #[test]
    fn day_bounds_shrink_on_spring_forward() {
        // US DST starts 2026-03-08; that local day is 23 hours long.
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(), New_York);
        assert_eq!(end - start, Duration::hours(23));
    }

    #[test]
    fn write_body_carries_summary_and_rfc3339_times() {
        let event = Event::proposal(
            "Gym",
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap(),
        );
        let body = to_google_event(&event);
        assert_eq!(body.summary.as_deref(), Some("Gym"));
        assert_eq!(
            body.start.unwrap().date_time.as_deref(),
            Some("2026-03-02T12:00:00+00:00")
        );
        assert!(body.id.is_none());
    }
}
