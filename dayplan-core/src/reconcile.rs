//! The reconciliation engine.
//!
//! Merges a freshly generated candidate list against existing calendar
//! events and, on revision rounds, against the prior proposed schedule.
//! Assigns provenance, resolves cross-round identity, and keeps every merge
//! deterministic: all tie-breaks are fixed rules, never map order.

use chrono::{DateTime, Duration, Utc};

use crate::event::{Event, ExistingEvent, Schedule, SourceKind};

/// Tunables for the merge.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Overlap with an existing event beyond this counts as a duplicate.
    /// Zero means any positive overlap; touching endpoints do not count.
    pub overlap_tolerance: Duration,
    /// Maximum |start delta| for a feedback candidate to match a prior
    /// schedule entry.
    pub match_window: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            overlap_tolerance: Duration::zero(),
            match_window: Duration::hours(3),
        }
    }
}

/// Merge one round of model output into a new proposed schedule.
///
/// With an empty `prior` this is a generate round: existing events always
/// win over overlapping candidates and are all carried into the result.
/// With a non-empty `prior` this is a feedback round: candidates are
/// identity-matched against the prior schedule and promoted or updated.
pub fn reconcile(
    candidates: Vec<Event>,
    existing: &[ExistingEvent],
    prior: &[Event],
    config: &ReconcileConfig,
) -> Schedule {
    if prior.is_empty() {
        generate_round(candidates, existing, config)
    } else {
        feedback_round(candidates, prior, config)
    }
}

/// Commit-time defense: re-run the generate-round carry-over against a
/// fresh calendar snapshot. Pending entries that meanwhile appeared on the
/// calendar are dropped in favor of the calendar's copy; newly appeared
/// events are carried in as unchanged.
pub fn refresh_against_calendar(
    schedule: Schedule,
    existing: &[ExistingEvent],
    config: &ReconcileConfig,
) -> Schedule {
    let mut entries = schedule.events;
    let mut merged = Vec::new();

    for fresh in existing {
        if let Some(pos) = entries
            .iter()
            .position(|e| e.calendar_event_id.as_deref() == Some(fresh.id.as_str()))
        {
            // The session already tracks this calendar event.
            merged.push(entries.remove(pos));
        } else {
            // Appeared since the session snapshot: the calendar wins over
            // any overlapping pending proposal.
            entries.retain(|e| {
                e.calendar_event_id.is_some()
                    || !overlaps_beyond(e, fresh.start, fresh.end, config.overlap_tolerance)
            });
            merged.push(Event::from_existing(fresh));
        }
    }

    merged.append(&mut entries);
    Schedule::new(merged)
}

fn generate_round(
    candidates: Vec<Event>,
    existing: &[ExistingEvent],
    config: &ReconcileConfig,
) -> Schedule {
    // The day's fixed commitments are always part of the picture.
    let mut merged: Vec<Event> = existing.iter().map(Event::from_existing).collect();

    for candidate in candidates {
        let duplicate = existing
            .iter()
            .any(|e| overlaps_beyond(&candidate, e.start, e.end, config.overlap_tolerance));
        if !duplicate {
            merged.push(candidate);
        }
    }

    Schedule::new(merged)
}

fn feedback_round(candidates: Vec<Event>, prior: &[Event], config: &ReconcileConfig) -> Schedule {
    let mut claimed = vec![false; prior.len()];
    let mut matches: Vec<Option<usize>> = Vec::with_capacity(candidates.len());

    // Candidates claim prior entries in order, so a prior entry is merged
    // with at most one candidate per round.
    for candidate in &candidates {
        let best = best_match(candidate, prior, &claimed, config);
        if let Some(idx) = best {
            claimed[idx] = true;
        }
        matches.push(best);
    }

    let mut merged = Vec::new();

    // Prior entries tied to real calendar events survive even when the
    // model's reply omits them; feedback about one event must never drop
    // unrelated fixed commitments. Unclaimed purely-proposed entries are
    // dropped: the model omitting them is how a removal is expressed.
    for (idx, entry) in prior.iter().enumerate() {
        if !claimed[idx] && entry.calendar_event_id.is_some() {
            merged.push(entry.clone());
        }
    }

    for (candidate, matched) in candidates.into_iter().zip(matches) {
        match matched {
            Some(idx) => merged.push(apply_match(candidate, &prior[idx])),
            None => merged.push(candidate),
        }
    }

    Schedule::new(merged)
}

/// How a candidate summary relates to a prior entry's summary.
/// Exact (case-insensitive) matches outrank containment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SummaryAffinity {
    Exact,
    Contains,
}

/// Total order over match quality: summary affinity first, then smaller
/// start-time distance, then earliest prior start. The derived lexicographic
/// `Ord` is exactly the documented tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MatchRank {
    affinity: SummaryAffinity,
    delta: Duration,
    prior_start: DateTime<Utc>,
}

fn best_match(
    candidate: &Event,
    prior: &[Event],
    claimed: &[bool],
    config: &ReconcileConfig,
) -> Option<usize> {
    let mut best: Option<(MatchRank, usize)> = None;
    for (idx, entry) in prior.iter().enumerate() {
        if claimed[idx] {
            continue;
        }
        let Some(affinity) = summary_affinity(&candidate.summary, &entry.summary) else {
            continue;
        };
        let delta = (candidate.start - entry.start).abs();
        if delta > config.match_window {
            continue;
        }
        let rank = MatchRank {
            affinity,
            delta,
            prior_start: entry.start,
        };
        if best.is_none_or(|(current, _)| rank < current) {
            best = Some((rank, idx));
        }
    }
    best.map(|(_, idx)| idx)
}

/// Two-key summary comparison: exact case-insensitive match preferred,
/// containment in either direction as fallback. The model may rephrase a
/// summary slightly while moving a time, or keep it while moving the time
/// significantly; matching on either key alone produces false merges.
fn summary_affinity(a: &str, b: &str) -> Option<SummaryAffinity> {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a == b {
        Some(SummaryAffinity::Exact)
    } else if a.contains(&b) || b.contains(&a) {
        Some(SummaryAffinity::Contains)
    } else {
        None
    }
}

fn apply_match(candidate: Event, entry: &Event) -> Event {
    let moved = candidate.start != entry.start || candidate.end != entry.end;
    if !moved {
        // No-op regeneration keeps the prior entry untouched, including its
        // provenance; no spurious "modified" flagging.
        return entry.clone();
    }

    if entry.calendar_event_id.is_some() {
        Event {
            // The calendar's own wording wins over a model rephrase.
            summary: entry.summary.clone(),
            start: candidate.start,
            end: candidate.end,
            source_kind: SourceKind::ExistingModified,
            calendar_event_id: entry.calendar_event_id.clone(),
            // Propagate the earliest known original across rounds.
            original_start: Some(entry.original_start.unwrap_or(entry.start)),
            original_end: Some(entry.original_end.unwrap_or(entry.end)),
        }
    } else {
        // Uncommitted proposals are simply updated in place and stay NEW;
        // original-time tracking only means something for committed events.
        Event::proposal(candidate.summary, candidate.start, candidate.end)
    }
}

fn overlaps_beyond(
    event: &Event,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tolerance: Duration,
) -> bool {
    let overlap = event.end.min(end) - event.start.max(start);
    overlap > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, min, 0).unwrap()
    }

    fn existing(id: &str, summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ExistingEvent {
        ExistingEvent {
            id: id.to_string(),
            summary: summary.to_string(),
            start,
            end,
        }
    }

    fn committed(id: &str, summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event::from_existing(&existing(id, summary, start, end))
    }

    #[test]
    fn generate_round_drops_candidates_overlapping_existing_events() {
        let standup = existing("cal1", "Standup", at(9, 0), at(9, 30));
        let candidates = vec![
            Event::proposal("standup", at(9, 0), at(9, 30)),
            Event::proposal("Gym", at(7, 0), at(8, 0)),
        ];

        let result = reconcile(candidates, &[standup], &[], &ReconcileConfig::default());

        assert_eq!(result.len(), 2);
        assert_eq!(result.events[0].summary, "Gym");
        assert_eq!(result.events[0].source_kind, SourceKind::New);
        assert_eq!(result.events[1].summary, "Standup");
        assert_eq!(result.events[1].source_kind, SourceKind::ExistingUnchanged);
        assert_eq!(result.events[1].calendar_event_id.as_deref(), Some("cal1"));
    }

    #[test]
    fn generate_round_carries_every_existing_event() {
        let fixed = vec![
            existing("a", "Standup", at(9, 0), at(9, 30)),
            existing("b", "1:1", at(15, 0), at(15, 30)),
            existing("c", "Review", at(17, 0), at(18, 0)),
        ];
        let candidates = vec![Event::proposal("Gym", at(7, 0), at(8, 0))];

        let result = reconcile(candidates, &fixed, &[], &ReconcileConfig::default());

        for e in &fixed {
            assert!(
                result
                    .iter()
                    .any(|r| r.calendar_event_id.as_deref() == Some(e.id.as_str())),
                "existing event {} must be carried over",
                e.id
            );
        }
    }

    #[test]
    fn generate_round_is_deterministic() {
        let fixed = vec![existing("a", "Standup", at(9, 0), at(9, 30))];
        let candidates = vec![
            Event::proposal("Gym", at(7, 0), at(8, 0)),
            Event::proposal("Lunch", at(12, 0), at(13, 0)),
        ];

        let first = reconcile(candidates.clone(), &fixed, &[], &ReconcileConfig::default());
        let second = reconcile(candidates, &fixed, &[], &ReconcileConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn touching_endpoints_do_not_count_as_overlap() {
        let fixed = vec![existing("a", "Standup", at(9, 0), at(9, 30))];
        let candidates = vec![Event::proposal("Focus block", at(9, 30), at(11, 0))];

        let result = reconcile(candidates, &fixed, &[], &ReconcileConfig::default());
        assert_eq!(result.len(), 2);
    }

    // Scenario from the product brief: existing Standup, rant mentioning
    // gym, lunch, and the standup that is already on the calendar.
    #[test]
    fn generate_scenario_standup_gym_lunch() {
        let fixed = vec![existing("cal1", "Standup", at(9, 0), at(9, 30))];
        let candidates = vec![
            Event::proposal("Gym", at(7, 0), at(8, 0)),
            Event::proposal("Lunch with Sam", at(12, 0), at(13, 0)),
            Event::proposal("Standup", at(9, 0), at(9, 30)),
        ];

        let result = reconcile(candidates, &fixed, &[], &ReconcileConfig::default());

        let described: Vec<(&str, SourceKind)> = result
            .iter()
            .map(|e| (e.summary.as_str(), e.source_kind))
            .collect();
        assert_eq!(
            described,
            vec![
                ("Gym", SourceKind::New),
                ("Standup", SourceKind::ExistingUnchanged),
                ("Lunch with Sam", SourceKind::New),
            ]
        );
        assert_eq!(result.events[1].calendar_event_id.as_deref(), Some("cal1"));
    }

    #[test]
    fn feedback_moving_a_committed_event_tracks_originals() {
        let prior = vec![committed("X", "Lunch", at(9, 0), at(10, 0))];
        let candidates = vec![Event::proposal("Lunch", at(11, 0), at(12, 0))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        assert_eq!(result.len(), 1);
        let lunch = &result.events[0];
        assert_eq!(lunch.source_kind, SourceKind::ExistingModified);
        assert_eq!(lunch.calendar_event_id.as_deref(), Some("X"));
        assert_eq!(lunch.start, at(11, 0));
        assert_eq!(lunch.end, at(12, 0));
        assert_eq!(lunch.original_start, Some(at(9, 0)));
        assert_eq!(lunch.original_end, Some(at(10, 0)));
    }

    #[test]
    fn original_time_survives_a_second_move() {
        let config = ReconcileConfig::default();
        let prior = vec![committed("X", "Lunch", at(9, 0), at(10, 0))];

        let round1 = reconcile(
            vec![Event::proposal("Lunch", at(11, 0), at(12, 0))],
            &[],
            &prior,
            &config,
        );
        let round2 = reconcile(
            vec![Event::proposal("Lunch", at(14, 0), at(15, 0))],
            &[],
            &round1.events,
            &config,
        );

        let lunch = &round2.events[0];
        assert_eq!(lunch.start, at(14, 0));
        // The earliest ancestor, not the round-1 proposal.
        assert_eq!(lunch.original_start, Some(at(9, 0)));
        assert_eq!(lunch.original_end, Some(at(10, 0)));
    }

    #[test]
    fn feedback_moving_an_uncommitted_proposal_keeps_it_new() {
        let prior = vec![Event::proposal("Lunch", at(12, 0), at(13, 0))];
        let candidates = vec![Event::proposal("Lunch", at(13, 0), at(14, 0))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        let lunch = &result.events[0];
        assert_eq!(lunch.source_kind, SourceKind::New);
        assert_eq!(lunch.start, at(13, 0));
        assert_eq!(lunch.original_start, None);
        assert_eq!(lunch.calendar_event_id, None);
    }

    #[test]
    fn feedback_with_unchanged_times_keeps_prior_provenance() {
        let mut moved = committed("X", "Lunch", at(11, 0), at(12, 0));
        moved.source_kind = SourceKind::ExistingModified;
        moved.original_start = Some(at(9, 0));
        moved.original_end = Some(at(10, 0));
        let prior = vec![moved.clone()];

        // The model re-emits the entry at the same time.
        let candidates = vec![Event::proposal("Lunch", at(11, 0), at(12, 0))];
        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        assert_eq!(result.events[0], moved);
    }

    #[test]
    fn feedback_retains_unmentioned_committed_events() {
        let prior = vec![
            committed("cal1", "Standup", at(9, 0), at(9, 30)),
            Event::proposal("Gym", at(7, 0), at(8, 0)),
            Event::proposal("Lunch with Sam", at(12, 0), at(13, 0)),
        ];
        // Feedback only mentions lunch.
        let candidates = vec![Event::proposal("Lunch with Sam", at(13, 0), at(14, 0))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        // Standup survives; the untouched Gym proposal was omitted by the
        // model and is treated as removed.
        assert!(result.iter().any(|e| e.summary == "Standup"));
        assert!(!result.iter().any(|e| e.summary == "Gym"));
        let lunch = result.iter().find(|e| e.summary == "Lunch with Sam").unwrap();
        assert_eq!(lunch.start, at(13, 0));
        assert_eq!(lunch.source_kind, SourceKind::New);
    }

    #[test]
    fn summary_containment_matches_a_rephrased_entry() {
        let prior = vec![committed("X", "Lunch with Sam", at(12, 0), at(13, 0))];
        let candidates = vec![Event::proposal("lunch", at(13, 0), at(14, 0))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        assert_eq!(result.len(), 1);
        let lunch = &result.events[0];
        assert_eq!(lunch.summary, "Lunch with Sam");
        assert_eq!(lunch.source_kind, SourceKind::ExistingModified);
    }

    #[test]
    fn matches_outside_the_window_become_new_events() {
        let prior = vec![committed("X", "Lunch", at(12, 0), at(13, 0))];
        // Same summary, but nine hours away: beyond the 3h window.
        let candidates = vec![Event::proposal("Lunch", at(21, 0), at(22, 0))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        assert_eq!(result.len(), 2);
        assert!(result.iter().any(|e| e.source_kind == SourceKind::New));
        assert!(
            result
                .iter()
                .any(|e| e.source_kind == SourceKind::ExistingUnchanged)
        );
    }

    #[test]
    fn ambiguous_match_prefers_smaller_temporal_distance() {
        let prior = vec![
            committed("far", "Sync", at(10, 0), at(10, 30)),
            committed("near", "Sync", at(11, 30), at(12, 0)),
        ];
        let candidates = vec![Event::proposal("Sync", at(12, 0), at(12, 30))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        let modified = result
            .iter()
            .find(|e| e.source_kind == SourceKind::ExistingModified)
            .unwrap();
        assert_eq!(modified.calendar_event_id.as_deref(), Some("near"));
    }

    #[test]
    fn exact_distance_tie_resolves_to_earliest_prior_start() {
        let prior = vec![
            committed("later", "Sync", at(13, 0), at(13, 30)),
            committed("earlier", "Sync", at(11, 0), at(11, 30)),
        ];
        // Candidate equidistant (1h) from both priors.
        let candidates = vec![Event::proposal("Sync", at(12, 0), at(12, 30))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        let modified = result
            .iter()
            .find(|e| e.source_kind == SourceKind::ExistingModified)
            .unwrap();
        assert_eq!(modified.calendar_event_id.as_deref(), Some("earlier"));
    }

    #[test]
    fn exact_summary_outranks_containment() {
        let prior = vec![
            committed("contains", "Team lunch", at(12, 0), at(12, 30)),
            committed("exact", "Lunch", at(13, 0), at(13, 30)),
        ];
        let candidates = vec![Event::proposal("lunch", at(12, 15), at(12, 45))];

        let result = reconcile(candidates, &[], &prior, &ReconcileConfig::default());

        let modified = result
            .iter()
            .find(|e| e.source_kind == SourceKind::ExistingModified)
            .unwrap();
        assert_eq!(modified.calendar_event_id.as_deref(), Some("exact"));
    }

    #[test]
    fn refresh_drops_pending_work_that_appeared_on_the_calendar() {
        let schedule = Schedule::new(vec![
            Event::proposal("Gym", at(7, 0), at(8, 0)),
            committed("cal1", "Standup", at(9, 0), at(9, 30)),
        ]);
        // Someone committed a gym session from another device meanwhile.
        let fresh = vec![
            existing("cal1", "Standup", at(9, 0), at(9, 30)),
            existing("cal2", "Gym", at(7, 0), at(8, 0)),
        ];

        let result = refresh_against_calendar(schedule, &fresh, &ReconcileConfig::default());

        assert_eq!(result.len(), 2);
        let gym = result.iter().find(|e| e.summary == "Gym").unwrap();
        assert_eq!(gym.source_kind, SourceKind::ExistingUnchanged);
        assert_eq!(gym.calendar_event_id.as_deref(), Some("cal2"));
    }

    #[test]
    fn refresh_keeps_tracked_modifications() {
        let mut moved = committed("cal1", "Standup", at(16, 0), at(16, 30));
        moved.source_kind = SourceKind::ExistingModified;
        moved.original_start = Some(at(9, 0));
        moved.original_end = Some(at(9, 30));
        let schedule = Schedule::new(vec![moved.clone()]);

        let fresh = vec![existing("cal1", "Standup", at(9, 0), at(9, 30))];
        let result = refresh_against_calendar(schedule, &fresh, &ReconcileConfig::default());

        assert_eq!(result.events, vec![moved]);
    }
}
