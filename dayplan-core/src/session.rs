//! Session state for the generate → feedback → commit lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event::{ExistingEvent, Schedule};

/// One conversation thread: a single calendar day being planned.
///
/// Created on the first successful generation, mutated in place on each
/// feedback round, removed on successful commit or explicit cancellation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub date: NaiveDate,
    pub tz: Tz,
    /// Snapshot of the day's calendar, captured once at creation.
    /// Deliberately not refreshed during feedback rounds: a mid-session
    /// refresh could surface events the user just committed elsewhere. A
    /// fresh fetch happens again right before commit.
    pub existing: Vec<ExistingEvent>,
    pub schedule: Schedule,
}

impl Session {
    pub fn new(date: NaiveDate, tz: Tz, existing: Vec<ExistingEvent>) -> Self {
        Session {
            id: Uuid::new_v4().to_string(),
            date,
            tz,
            existing,
            schedule: Schedule::default(),
        }
    }

    /// Install a new schedule, replacing the previous one as a whole value.
    /// Callers hold the session's lock, so no partial update is ever
    /// observable.
    pub fn replace_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }
}

/// In-memory store owning all sessions.
///
/// Each session sits behind its own mutex, so feedback rounds on one
/// session serialize while unrelated sessions stay independent. The outer
/// map lock is only held for lookups, never across I/O.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; returns its id.
    pub async fn insert(&self, session: Session) -> String {
        let id = session.id.clone();
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().await.remove(id)
    }
}
