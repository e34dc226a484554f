//! Orchestration of the generate → feedback → commit lifecycle.
//!
//! The `Planner` wires the calendar gateway, the scheduling model, and the
//! session store together. All reconciliation happens synchronously in
//! memory; the model and calendar calls are the only suspension points. A
//! session is mutated only after its whole new schedule is computed, so an
//! abandoned request never leaves a partial update behind.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::context::{ContextConfig, ContextMode, ModelContext, build_context};
use crate::error::{PlanError, PlanResult};
use crate::event::{Schedule, SourceKind};
use crate::gateway::CalendarGateway;
use crate::model::ScheduleModel;
use crate::normalize::{NormalizeWarning, candidate_count, normalize_candidates, parse_candidates};
use crate::reconcile::{ReconcileConfig, reconcile, refresh_against_calendar};
use crate::session::{Session, SessionStore};

/// Automatic retries per model call. The budget is consumed by an empty
/// reply or a timeout; a second failure is surfaced to the caller.
const MODEL_RETRY_BUDGET: u8 = 1;

#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    pub context: ContextConfig,
    pub reconcile: ReconcileConfig,
}

/// Result of a generate or feedback round.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub session_id: String,
    pub schedule: Schedule,
    /// The model saw a truncated day (existing-event cap exceeded).
    pub truncated: bool,
    pub warnings: Vec<NormalizeWarning>,
}

pub struct Planner<G, M> {
    gateway: G,
    model: M,
    store: SessionStore,
    config: PlannerConfig,
}

impl<G: CalendarGateway, M: ScheduleModel> Planner<G, M> {
    pub fn new(gateway: G, model: M, config: PlannerConfig) -> Self {
        Planner {
            gateway,
            model,
            store: SessionStore::new(),
            config,
        }
    }

    /// First round: turn an utterance into a proposed schedule and open a
    /// session for it.
    pub async fn generate(&self, utterance: &str, credential: &str) -> PlanResult<PlanOutcome> {
        self.generate_at(utterance, credential, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        utterance: &str,
        credential: &str,
        now: DateTime<Utc>,
    ) -> PlanResult<PlanOutcome> {
        let tz = self.gateway.calendar_timezone(credential).await?;
        let date = now.with_timezone(&tz).date_naive();
        let existing = self.gateway.fetch_day(date, tz, credential).await?;

        let mut session = Session::new(date, tz, existing);
        let context = build_context(
            &session,
            utterance,
            ContextMode::Generate,
            now,
            &self.config.context,
        );
        let expect_candidates = !utterance.trim().is_empty();
        let raw = self.call_model(&context, expect_candidates).await?;

        let candidates = parse_candidates(&raw)?;
        let (events, warnings) = normalize_candidates(&candidates, session.date, session.tz)?;
        let schedule = reconcile(events, &session.existing, &[], &self.config.reconcile);

        session.replace_schedule(schedule.clone());
        let session_id = self.store.insert(session).await;

        Ok(PlanOutcome {
            session_id,
            schedule,
            truncated: context.truncated,
            warnings,
        })
    }

    /// Revision round: apply a natural-language edit to the session's
    /// current proposal. Rounds on one session serialize on its lock.
    pub async fn feedback(
        &self,
        session_id: &str,
        utterance: &str,
        credential: &str,
    ) -> PlanResult<PlanOutcome> {
        self.feedback_at(session_id, utterance, credential, Utc::now())
            .await
    }

    pub async fn feedback_at(
        &self,
        session_id: &str,
        utterance: &str,
        _credential: &str,
        now: DateTime<Utc>,
    ) -> PlanResult<PlanOutcome> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| PlanError::SessionNotFound(session_id.to_string()))?;
        let mut session = handle.lock().await;

        let context = build_context(
            &session,
            utterance,
            ContextMode::Feedback,
            now,
            &self.config.context,
        );
        // An empty reply on a feedback round is a valid "drop every open
        // proposal"; committed events survive reconciliation regardless.
        let raw = self.call_model(&context, false).await?;

        let candidates = parse_candidates(&raw)?;
        let (events, warnings) = normalize_candidates(&candidates, session.date, session.tz)?;
        let schedule = reconcile(
            events,
            &session.existing,
            &session.schedule.events,
            &self.config.reconcile,
        );

        session.replace_schedule(schedule.clone());

        Ok(PlanOutcome {
            session_id: session.id.clone(),
            schedule,
            truncated: context.truncated,
            warnings,
        })
    }

    /// Write the session's accepted schedule to the calendar.
    ///
    /// Restartable: each event commits independently. On partial failure
    /// the session stays alive with successful writes recorded, so a second
    /// commit only attempts what is still pending. Full success removes the
    /// session.
    pub async fn commit(&self, session_id: &str, credential: &str) -> PlanResult<Schedule> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| PlanError::SessionNotFound(session_id.to_string()))?;
        let mut session = handle.lock().await;

        // Close the staleness window: anything that reached the calendar
        // since the session snapshot must not be committed twice.
        let fresh = self
            .gateway
            .fetch_day(session.date, session.tz, credential)
            .await?;
        let mut schedule =
            refresh_against_calendar(session.schedule.clone(), &fresh, &self.config.reconcile);

        let mut failure: Option<PlanError> = None;
        for event in &mut schedule.events {
            let attempt = if event.calendar_event_id.is_none() {
                match self.gateway.insert_event(event, credential).await {
                    Ok(id) => {
                        event.calendar_event_id = Some(id);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else if event.source_kind == SourceKind::ExistingModified {
                match self.gateway.update_event(event, credential).await {
                    Ok(()) => {
                        // Committed at its new time; the move is no longer
                        // pending.
                        event.source_kind = SourceKind::ExistingUnchanged;
                        event.original_start = None;
                        event.original_end = None;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else {
                Ok(())
            };
            if let Err(err) = attempt {
                // Keep going: later events still get their write attempt.
                failure.get_or_insert(err);
            }
        }

        session.replace_schedule(schedule.clone());

        if let Some(err) = failure {
            return Err(err);
        }

        drop(session);
        self.store.remove(session_id).await;
        Ok(schedule)
    }

    /// Current proposal for a session.
    pub async fn schedule(&self, session_id: &str) -> PlanResult<Schedule> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| PlanError::SessionNotFound(session_id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.schedule.clone())
    }

    /// Abandon a session without committing.
    pub async fn cancel(&self, session_id: &str) -> PlanResult<()> {
        self.store
            .remove(session_id)
            .await
            .map(|_| ())
            .ok_or_else(|| PlanError::SessionNotFound(session_id.to_string()))
    }

    /// One model call with the explicit single-retry budget.
    async fn call_model(&self, context: &ModelContext, expect_candidates: bool) -> PlanResult<Value> {
        let mut retries = MODEL_RETRY_BUDGET;
        let mut context = context.clone();
        loop {
            let failure = match self.model.generate(&context).await {
                Ok(raw) => {
                    if expect_candidates && candidate_count(&raw) == Some(0) {
                        PlanError::EmptyModelResponse
                    } else {
                        return Ok(raw);
                    }
                }
                Err(err @ PlanError::UpstreamTimeout(_)) => err,
                Err(err) => return Err(err),
            };
            if retries == 0 {
                return Err(failure);
            }
            retries -= 1;
            if matches!(failure, PlanError::EmptyModelResponse) {
                // Clarifying reframe for the one retry.
                context.prompt.push_str(
                    "\n\nYour previous reply contained no events. Re-read my description and return at least one event in the required JSON shape.",
                );
            }
        }
    }
}
