//! In-memory session store.
//!
//! Holds every session and its event timeline for the lifetime of the
//! process. Nothing is written to disk; export a [`SessionReport`] to keep a
//! session around.

use crate::clock::SharedClock;
use crate::core::aggregation::{aggregate, SessionStats};
use crate::core::recording::{decide, RecordDecision};
use crate::core::timeline::{series, TimelinePoint};
use crate::detection::FocusState;
use crate::session::model::{Session, SessionEvent, SessionPatch, SessionReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors returned by the session store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("no active session")]
    NoActiveSession,
}

/// Sessions, their events and the current-session pointer.
pub struct SessionStore {
    sessions: HashMap<Uuid, Session>,
    events: HashMap<Uuid, Vec<SessionEvent>>,
    current: Option<Uuid>,
    clock: SharedClock,
}

impl SessionStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            sessions: HashMap::new(),
            events: HashMap::new(),
            current: None,
            clock,
        }
    }

    /// Start a new session at the clock's current instant. It becomes the
    /// current session.
    pub fn create_session(&mut self, user_id: Option<String>) -> Session {
        let session = Session::new(user_id, self.clock.now());
        tracing::info!(session = %session.id, "session started");

        self.events.insert(session.id, Vec::new());
        self.sessions.insert(session.id, session.clone());
        self.current = Some(session.id);
        session
    }

    pub fn get_session(&self, id: Uuid) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// The most recently created session, ended or not.
    pub fn current_session(&self) -> Option<&Session> {
        self.current.and_then(|id| self.sessions.get(&id))
    }

    /// Apply a partial update.
    pub fn update_session(&mut self, id: Uuid, patch: &SessionPatch) -> Result<Session, StoreError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.apply_patch(patch);
        Ok(session.clone())
    }

    /// Record an observed state for a running session.
    ///
    /// Appends an event only if `state` differs from the session's current
    /// state, and returns it; otherwise returns `None`. Missing and ended
    /// sessions are rejected with [`StoreError::NoActiveSession`].
    pub fn record_state(
        &mut self,
        id: Uuid,
        state: FocusState,
        confidence: f64,
    ) -> Result<Option<SessionEvent>, StoreError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .get_mut(&id)
            .filter(|s| s.is_active())
            .ok_or(StoreError::NoActiveSession)?;

        match decide(session.current_state, state) {
            RecordDecision::Unchanged => Ok(None),
            RecordDecision::Append { from, to } => {
                let event = SessionEvent::new(id, now, to, confidence);
                session.current_state = to;
                self.events.entry(id).or_default().push(event.clone());
                tracing::debug!(session = %id, %from, %to, "state transition recorded");
                Ok(Some(event))
            }
        }
    }

    /// Events of a session, oldest first.
    pub fn events(&self, id: Uuid) -> Result<Vec<SessionEvent>, StoreError> {
        if !self.sessions.contains_key(&id) {
            return Err(StoreError::SessionNotFound(id));
        }
        let mut events = self.events.get(&id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// Statistics for a session as of now, or as of its end once ended.
    pub fn stats(&self, id: Uuid) -> Result<SessionStats, StoreError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let until = session.end_time.unwrap_or_else(|| self.clock.now());
        let events = self.events.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(aggregate(session.start_time, events, until))
    }

    /// The session state every `step` from its start to now, or to its end
    /// once ended.
    pub fn timeline(
        &self,
        id: Uuid,
        step: chrono::Duration,
    ) -> Result<Vec<TimelinePoint>, StoreError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let until = session.end_time.unwrap_or_else(|| self.clock.now());
        let events = self.events.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(series(session.start_time, events, until, step))
    }

    /// Recompute and store the running totals of a session. An ended
    /// session keeps the totals frozen by [`Self::end_session`].
    pub fn refresh_stats(&mut self, id: Uuid) -> Result<Session, StoreError> {
        let stats = self.stats(id)?;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        if session.is_active() {
            session.apply_stats(&stats);
        }
        Ok(session.clone())
    }

    /// End a running session: totals are computed one last time at the end
    /// instant and the total duration is frozen.
    pub fn end_session(&mut self, id: Uuid) -> Result<Session, StoreError> {
        let end = self.clock.now();
        let session = self
            .sessions
            .get(&id)
            .filter(|s| s.is_active())
            .ok_or(StoreError::NoActiveSession)?;
        let events = self.events.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let stats = aggregate(session.start_time, events, end);

        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.apply_stats(&stats);
        session.end(end);
        tracing::info!(
            session = %id,
            duration_secs = session.total_duration,
            focus_score = session.focus_score,
            "session ended"
        );
        Ok(session.clone())
    }

    /// Session, timeline and stats bundled for export.
    pub fn report(&self, id: Uuid) -> Result<SessionReport, StoreError> {
        let session = self
            .sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(id))?;
        Ok(SessionReport {
            events: self.events(id)?,
            stats: self.stats(id)?,
            session,
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Session store shared between async tasks.
pub type SharedSessionStore = Arc<RwLock<SessionStore>>;

/// Create a new shared session store.
pub fn create_shared_store(clock: SharedClock) -> SharedSessionStore {
    Arc::new(RwLock::new(SessionStore::new(clock)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};

    fn store() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (clock.clone(), SessionStore::new(clock))
    }

    #[test]
    fn test_create_becomes_current() {
        let (_clock, mut store) = store();
        assert!(store.current_session().is_none());

        let first = store.create_session(None);
        let second = store.create_session(Some("student".to_string()));
        assert_eq!(store.current_session().map(|s| s.id), Some(second.id));
        assert!(store.get_session(first.id).is_some());
        assert_eq!(store.session_count(), 2);
    }

    #[test]
    fn test_same_state_twice_records_once() {
        let (clock, mut store) = store();
        let session = store.create_session(None);

        clock.advance(Duration::seconds(5));
        let first = store.record_state(session.id, FocusState::Drowsy, 0.9).unwrap();
        clock.advance(Duration::seconds(5));
        let second = store.record_state(session.id, FocusState::Drowsy, 0.9).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.events(session.id).unwrap().len(), 1);
        assert_eq!(
            store.get_session(session.id).unwrap().current_state,
            FocusState::Drowsy
        );
    }

    #[test]
    fn test_initial_focused_observation_is_not_recorded() {
        let (_clock, mut store) = store();
        let session = store.create_session(None);
        let recorded = store
            .record_state(session.id, FocusState::Focused, 0.9)
            .unwrap();
        assert!(recorded.is_none());
    }

    #[test]
    fn test_recording_requires_active_session() {
        let (_clock, mut store) = store();
        assert_eq!(
            store.record_state(Uuid::new_v4(), FocusState::Drowsy, 0.5),
            Err(StoreError::NoActiveSession)
        );

        let session = store.create_session(None);
        store.end_session(session.id).unwrap();
        assert_eq!(
            store.record_state(session.id, FocusState::Drowsy, 0.5),
            Err(StoreError::NoActiveSession)
        );
        assert_eq!(
            store.end_session(session.id),
            Err(StoreError::NoActiveSession)
        );
    }

    #[test]
    fn test_refresh_and_end_apply_stats() {
        let (clock, mut store) = store();
        let session = store.create_session(None);

        clock.advance(Duration::seconds(60));
        store.record_state(session.id, FocusState::Drowsy, 0.8).unwrap();
        clock.advance(Duration::seconds(120));
        store.record_state(session.id, FocusState::Focused, 0.8).unwrap();
        clock.advance(Duration::seconds(120));

        let refreshed = store.refresh_stats(session.id).unwrap();
        assert_eq!(refreshed.focused_time, 180);
        assert_eq!(refreshed.drowsy_time, 120);
        assert_eq!(refreshed.total_duration, 300);
        assert_eq!(refreshed.focus_score, 60.0);

        let ended = store.end_session(session.id).unwrap();
        assert_eq!(ended.total_duration, 300);

        // Stats stay frozen at the end instant.
        clock.advance(Duration::seconds(1000));
        let stats = store.stats(session.id).unwrap();
        assert_eq!(stats.total_duration, 300);
        assert_eq!(stats.focus_score, 60);
    }

    #[test]
    fn test_refresh_keeps_ended_totals_frozen() {
        let (clock, mut store) = store();
        let session = store.create_session(None);
        clock.advance(Duration::seconds(300));

        let ended = store.end_session(session.id).unwrap();
        assert_eq!(ended.total_duration, 300);

        clock.advance(Duration::seconds(60));
        let refreshed = store.refresh_stats(session.id).unwrap();
        assert_eq!(refreshed, ended);
        assert_eq!(store.get_session(session.id).unwrap().total_duration, 300);
    }

    #[test]
    fn test_stats_without_events_are_zero() {
        let (clock, mut store) = store();
        let session = store.create_session(None);
        clock.advance(Duration::minutes(10));

        let stats = store.stats(session.id).unwrap();
        assert_eq!(stats, SessionStats::default());
    }

    #[test]
    fn test_timeline_follows_recorded_transitions() {
        let (clock, mut store) = store();
        let session = store.create_session(None);

        clock.advance(Duration::seconds(60));
        store.record_state(session.id, FocusState::Drowsy, 0.8).unwrap();
        clock.advance(Duration::seconds(60));
        store.end_session(session.id).unwrap();
        clock.advance(Duration::seconds(600));

        let points = store.timeline(session.id, Duration::seconds(30)).unwrap();
        let states: Vec<FocusState> = points.iter().map(|p| p.state).collect();
        assert_eq!(
            states,
            vec![
                FocusState::Focused,
                FocusState::Focused,
                FocusState::Drowsy,
                FocusState::Drowsy,
                FocusState::Drowsy,
            ]
        );
        // Ended sessions stop at their end instant.
        assert_eq!(points.last().map(|p| p.at), store.get_session(session.id).unwrap().end_time);

        let missing = Uuid::new_v4();
        assert_eq!(
            store.timeline(missing, Duration::seconds(30)),
            Err(StoreError::SessionNotFound(missing))
        );
    }

    #[test]
    fn test_update_unknown_session() {
        let (_clock, mut store) = store();
        let id = Uuid::new_v4();
        assert_eq!(
            store.update_session(id, &SessionPatch::default()),
            Err(StoreError::SessionNotFound(id))
        );
        assert_eq!(store.events(id), Err(StoreError::SessionNotFound(id)));
    }

    #[test]
    fn test_report_bundles_timeline() {
        let (clock, mut store) = store();
        let session = store.create_session(None);
        clock.advance(Duration::seconds(10));
        store
            .record_state(session.id, FocusState::Stressed, 0.7)
            .unwrap();
        clock.advance(Duration::seconds(10));

        let report = store.report(session.id).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.stats.stressed_time, 10);
        assert_eq!(report.stats.focused_time, 10);
        assert_eq!(report.session.id, session.id);
    }
}
