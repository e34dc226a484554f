//! Core types and the schedule reconciliation pipeline for dayplan.
//!
//! This crate holds everything that is pure and testable without network
//! access: the event schema and normalizer, the deterministic prompt/context
//! builder, the reconciliation engine, the session store, and the
//! generate → feedback → commit orchestration. The calendar provider and the
//! language model sit behind the `CalendarGateway` and `ScheduleModel`
//! traits; real implementations live in `dayplan-provider-google` and
//! `dayplan-openai`.

pub mod context;
pub mod error;
pub mod event;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod session;

pub use error::{PlanError, PlanResult};
pub use event::{Event, ExistingEvent, Schedule, SourceKind};
