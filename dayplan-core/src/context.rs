//! Deterministic prompt assembly for the scheduling model.
//!
//! Pure function of its inputs: the caller supplies the current time, the
//! session carries the calendar snapshot, and the same inputs always yield
//! the same context. No calendar ids ever leak into the prompt.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::event::{Event, SourceKind};
use crate::session::Session;

/// Cap on existing events included in a prompt, to bound context growth.
pub const DEFAULT_EXISTING_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub existing_cap: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            existing_cap: DEFAULT_EXISTING_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Generate,
    Feedback,
}

/// The bounded textual context handed to the model.
#[derive(Debug, Clone)]
pub struct ModelContext {
    pub prompt: String,
    /// Set when existing events were dropped to honor the cap, so a caller
    /// can warn the user the model saw an incomplete day.
    pub truncated: bool,
}

/// Assemble the model context for one round.
pub fn build_context(
    session: &Session,
    utterance: &str,
    mode: ContextMode,
    now: DateTime<Utc>,
    config: &ContextConfig,
) -> ModelContext {
    let tz = session.tz;
    let local_now = now.with_timezone(&tz);

    let mut existing = session.existing.clone();
    existing.sort_by_key(|e| e.start);
    // Oldest-by-start events are dropped first when over the cap.
    let truncated = existing.len() > config.existing_cap;
    if truncated {
        existing.drain(..existing.len() - config.existing_cap);
    }

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a helpful assistant that plans a single day of my calendar."
    );
    let _ = writeln!(
        prompt,
        "Today is {} and the current time is {} ({}).",
        session.date,
        local_now.to_rfc3339(),
        tz
    );
    prompt.push('\n');

    if existing.is_empty() {
        let _ = writeln!(prompt, "My calendar is empty for today.");
    } else {
        let _ = writeln!(
            prompt,
            "I have the following {} events already in my calendar:",
            existing.len()
        );
        for event in &existing {
            let _ = writeln!(
                prompt,
                "- {}: {} to {}",
                event.summary,
                event.start.with_timezone(&tz).to_rfc3339(),
                event.end.with_timezone(&tz).to_rfc3339()
            );
        }
    }
    prompt.push('\n');

    match mode {
        ContextMode::Generate => {
            let _ = writeln!(prompt, "I described my day as follows:");
            let _ = writeln!(prompt, "\"{}\"", utterance.trim());
            prompt.push('\n');
            let _ = writeln!(prompt, "CRITICAL RULES:");
            let _ = writeln!(
                prompt,
                "1. DEDUPLICATION: if something I described is already represented by an existing event, do NOT create a new event for it."
            );
            let _ = writeln!(
                prompt,
                "2. Do not move, drop, or modify existing events unless I explicitly asked."
            );
            let _ = writeln!(
                prompt,
                "3. Schedule new activities AROUND existing events - find gaps in the day."
            );
            let _ = writeln!(
                prompt,
                "4. When I give no duration, assume one hour."
            );
        }
        ContextMode::Feedback => {
            let _ = writeln!(prompt, "Here is the current proposed schedule:");
            for event in session.schedule.iter() {
                let _ = writeln!(prompt, "- {}", describe_entry(event, session));
            }
            prompt.push('\n');
            let _ = writeln!(prompt, "User feedback:");
            let _ = writeln!(prompt, "\"{}\"", utterance.trim());
            prompt.push('\n');
            let _ = writeln!(prompt, "CRITICAL RULES:");
            let _ = writeln!(
                prompt,
                "1. Return the FULL updated schedule, not just the changed entries."
            );
            let _ = writeln!(
                prompt,
                "2. Apply only the changes the feedback asks for; keep every other entry at its current time."
            );
            let _ = writeln!(
                prompt,
                "3. Keep each entry's summary wording unless the feedback renames it."
            );
            let _ = writeln!(
                prompt,
                "4. Do not duplicate events for the same activity."
            );
        }
    }
    prompt.push('\n');
    let _ = writeln!(
        prompt,
        "Output ONLY raw JSON, no prose, markdown, or code fences. The JSON shape must be exactly:"
    );
    let _ = write!(
        prompt,
        "{{\"events\":[{{\"summary\":\"<string>\",\"start\":\"<RFC3339 datetime>\",\"end\":\"<RFC3339 datetime>\"}}]}}"
    );

    ModelContext { prompt, truncated }
}

/// One schedule entry, rendered with provenance so the model can reason
/// about what is already fixed.
fn describe_entry(event: &Event, session: &Session) -> String {
    let tz = session.tz;
    let times = format!(
        "{} to {}",
        event.start.with_timezone(&tz).to_rfc3339(),
        event.end.with_timezone(&tz).to_rfc3339()
    );
    match event.source_kind {
        SourceKind::New => format!("{}: {} (newly proposed)", event.summary, times),
        SourceKind::ExistingUnchanged => {
            format!("{}: {} (already on the calendar)", event.summary, times)
        }
        SourceKind::ExistingModified => {
            let moved_from = event
                .original_start
                .map(|orig| orig.with_timezone(&tz).to_rfc3339())
                .unwrap_or_else(|| "its original time".to_string());
            format!(
                "{}: {} (on the calendar, moved from {})",
                event.summary, times, moved_from
            )
        }
    }
}
