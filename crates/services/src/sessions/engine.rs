use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use exam_core::model::{
    CompletionReason, ExamKind, ExamResult, ExamSession, Question, QuestionId, QuestionResponse,
    SessionError, SessionId, SessionStatus, UserId,
};
use exam_core::{Clock, SessionSettings};
use storage::repository::SessionSnapshotRepository;

use super::timers::SessionTimers;
use super::view::SessionView;

//
// ─── HOOKS ─────────────────────────────────────────────────────────────────────
//

/// Optional collaborators for a `SessionEngine`.
#[derive(Clone, Default)]
pub struct EngineHooks {
    snapshots: Option<Arc<dyn SessionSnapshotRepository>>,
    completions: Option<UnboundedSender<ExamResult>>,
}

impl EngineHooks {
    /// Persist a snapshot of every live session on each autosave tick.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SessionSnapshotRepository>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Receive every finalised result, including those forced by the countdown.
    #[must_use]
    pub fn with_completions(mut self, completions: UnboundedSender<ExamResult>) -> Self {
        self.completions = Some(completions);
        self
    }
}

//
// ─── REGISTRY ENTRY ────────────────────────────────────────────────────────────
//

struct SessionEntry {
    session: ExamSession,
    /// Monotonic reference point; time after it has not yet been charged.
    mark: Instant,
    /// Active time spent on the current question so far.
    question_elapsed: Duration,
    timers: SessionTimers,
    /// Bumped whenever timers are re-armed or cancelled so stale fires are ignored.
    generation: u64,
    result: Option<ExamResult>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl SessionEntry {
    fn new(session: ExamSession, now: Instant) -> Self {
        Self {
            session,
            mark: now,
            question_elapsed: Duration::ZERO,
            timers: SessionTimers::default(),
            generation: 0,
            result: None,
            last_saved_at: None,
        }
    }

    /// Charge time since the last mark to the session clock and the current question.
    fn settle(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.mark);
        if self.session.is_active() {
            self.session.consume(elapsed);
            self.question_elapsed += elapsed;
        }
        self.mark = now;
    }

    fn live_remaining(&self, now: Instant) -> Duration {
        if self.session.is_active() {
            self.session
                .remaining()
                .saturating_sub(now.saturating_duration_since(self.mark))
        } else {
            self.session.remaining()
        }
    }

    fn view(&self, now: Instant) -> SessionView {
        SessionView {
            id: self.session.id(),
            owner: self.session.owner(),
            kind: self.session.kind(),
            status: self.session.status(),
            position: self.session.position(),
            total_questions: self.session.questions().len(),
            answered: self.session.responses().len(),
            remaining_secs: self.live_remaining(now).as_secs(),
            is_review_mode: self.session.is_review_mode(),
            started_at: self.session.started_at(),
            last_saved_at: self.last_saved_at,
            result_ready: self.result.is_some(),
        }
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

struct EngineInner {
    clock: Clock,
    settings: SessionSettings,
    hooks: EngineHooks,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

/// Keyed registry of live exam sessions with their countdown and autosave timers.
///
/// Misuse (unknown id, wrong state, out-of-order answer) is reported through `bool`
/// and `Option` returns; the reason is logged at debug level.
///
/// Timers are Tokio tasks, so sessions must be started and resumed from within a
/// Tokio runtime.
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<EngineInner>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(clock: Clock, settings: SessionSettings) -> Self {
        Self::with_hooks(clock, settings, EngineHooks::default())
    }

    #[must_use]
    pub fn with_hooks(clock: Clock, settings: SessionSettings, hooks: EngineHooks) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                clock,
                settings,
                hooks,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Register a new active session over `questions` and start its timers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `questions` is empty.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the timers are spawned tasks.
    pub fn start(
        &self,
        owner: UserId,
        kind: ExamKind,
        questions: Vec<Question>,
    ) -> Result<ExamSession, SessionError> {
        let session = ExamSession::new(
            SessionId::generate(),
            owner,
            kind,
            questions,
            self.inner.clock.now(),
            self.inner.settings.time_limit(),
        )?;
        let id = session.id();

        let mut sessions = self.inner.lock();
        let entry = sessions
            .entry(id)
            .or_insert_with(|| SessionEntry::new(session.clone(), Instant::now()));
        self.inner.arm_timers(id, entry);
        info!(
            session = %id,
            owner = %owner,
            kind = kind.as_str(),
            questions = session.questions().len(),
            "session started"
        );
        Ok(session)
    }

    /// Answer the current question.
    ///
    /// Returns `None` if the session is unknown, paused, completed, or `question_id`
    /// is not the current question.
    pub fn submit_answer(
        &self,
        id: SessionId,
        question_id: QuestionId,
        selected: usize,
    ) -> Option<QuestionResponse> {
        let now = Instant::now();
        let mut sessions = self.inner.lock();
        let Some(entry) = sessions.get_mut(&id) else {
            debug!(session = %id, "answer for unknown session");
            return None;
        };
        if self.inner.advance(entry, now) {
            debug!(session = %id, "answer arrived after the time limit");
            return None;
        }

        let time_spent = u32::try_from(entry.question_elapsed.as_secs()).unwrap_or(u32::MAX);
        let answered_at = self.inner.clock.now();
        match entry
            .session
            .submit_answer(question_id, selected, time_spent, answered_at)
        {
            Ok(response) => {
                let response = response.clone();
                entry.question_elapsed = Duration::ZERO;
                debug!(
                    session = %id,
                    question = %question_id,
                    correct = response.is_correct,
                    time_spent,
                    "answer recorded"
                );
                if entry.session.is_completed() {
                    self.inner.finalize(entry);
                }
                Some(response)
            }
            Err(err) => {
                debug!(session = %id, error = %err, "answer rejected");
                None
            }
        }
    }

    /// Freeze the clock and stop both timers. Only an active session can pause.
    pub fn pause(&self, id: SessionId) -> bool {
        self.inner.transition(id, "pause", |_, entry| {
            entry.session.pause()?;
            entry.timers.cancel_all();
            entry.generation += 1;
            info!(
                session = %id,
                remaining_secs = entry.session.remaining().as_secs(),
                "session paused"
            );
            Ok(())
        })
    }

    /// Restart the clock from the frozen remaining time. Only a paused session can resume.
    pub fn resume(&self, id: SessionId) -> bool {
        self.inner.transition(id, "resume", |inner, entry| {
            entry.session.resume()?;
            entry.mark = Instant::now();
            inner.arm_timers(id, entry);
            info!(
                session = %id,
                remaining_secs = entry.session.remaining().as_secs(),
                "session resumed"
            );
            Ok(())
        })
    }

    /// Finish now and enter review mode.
    ///
    /// The countdown stops with time still on the clock; autosave keeps running until
    /// the result is taken.
    pub fn complete_early(&self, id: SessionId) -> bool {
        self.inner.transition(id, "complete early", |inner, entry| {
            entry.session.complete(CompletionReason::Early)?;
            inner.finalize(entry);
            Ok(())
        })
    }

    /// Force completion as if the countdown had reached zero.
    pub fn expire(&self, id: SessionId) -> bool {
        self.inner.transition(id, "expire", |inner, entry| {
            entry.session.complete(CompletionReason::Expired)?;
            inner.finalize(entry);
            Ok(())
        })
    }

    /// Jump to question `index`. Free navigation is only allowed in review mode.
    pub fn navigate_to_question(&self, id: SessionId, index: usize) -> Option<Question> {
        let mut sessions = self.inner.lock();
        let entry = sessions.get_mut(&id)?;
        match entry.session.navigate_to(index) {
            Ok(question) => Some(question.clone()),
            Err(err) => {
                debug!(session = %id, index, error = %err, "navigation rejected");
                None
            }
        }
    }

    #[must_use]
    pub fn view(&self, id: SessionId) -> Option<SessionView> {
        let now = Instant::now();
        self.inner.lock().get(&id).map(|entry| entry.view(now))
    }

    #[must_use]
    pub fn current_question(&self, id: SessionId) -> Option<Question> {
        self.inner
            .lock()
            .get(&id)
            .and_then(|entry| entry.session.current_question().cloned())
    }

    /// Full copy of the session state.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<ExamSession> {
        self.inner.lock().get(&id).map(|entry| entry.session.clone())
    }

    /// The finalised result, if the session has completed.
    #[must_use]
    pub fn result(&self, id: SessionId) -> Option<ExamResult> {
        self.inner.lock().get(&id).and_then(|entry| entry.result.clone())
    }

    /// Hand over the result and drop the session from the registry.
    ///
    /// Returns `None` while the session is still running.
    pub fn take_result(&self, id: SessionId) -> Option<ExamResult> {
        let mut sessions = self.inner.lock();
        let ready = sessions.get(&id).is_some_and(|entry| entry.result.is_some());
        if !ready {
            debug!(session = %id, "no result to take");
            return None;
        }
        let entry = sessions.remove(&id)?;
        debug!(session = %id, "session released");
        entry.result
    }

    /// Drop a session without producing a result.
    pub fn discard(&self, id: SessionId) -> bool {
        let removed = self.inner.lock().remove(&id).is_some();
        if removed {
            info!(session = %id, "session discarded");
        }
        removed
    }

    /// Re-register a session recovered from a snapshot.
    ///
    /// An in-progress session comes back paused with no timers running; a completed
    /// one comes back with its result ready. Returns `false` if the id is already live.
    pub fn restore(&self, mut session: ExamSession) -> bool {
        let id = session.id();
        let mut sessions = self.inner.lock();
        if sessions.contains_key(&id) {
            debug!(session = %id, "restore for live session ignored");
            return false;
        }
        session.mark_recovered();
        let entry = sessions
            .entry(id)
            .or_insert_with(|| SessionEntry::new(session, Instant::now()));
        if entry.session.is_completed() {
            self.inner.finalize(entry);
        }
        info!(session = %id, status = ?entry.session.status(), "session restored");
        true
    }

    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.lock().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.lock().keys().copied().collect()
    }

    /// Whether the countdown and autosave tasks are scheduled for `id`.
    #[must_use]
    pub fn timers_running(&self, id: SessionId) -> Option<(bool, bool)> {
        self.inner.lock().get(&id).map(|entry| {
            (
                entry.timers.countdown_running(),
                entry.timers.autosave_running(),
            )
        })
    }
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settle elapsed time and expire the session if its clock ran out.
    ///
    /// Returns `true` when this call completed the session.
    fn advance(&self, entry: &mut SessionEntry, now: Instant) -> bool {
        entry.settle(now);
        if entry.session.is_active() && entry.session.remaining().is_zero() {
            info!(session = %entry.session.id(), "time limit reached");
            if entry.session.complete(CompletionReason::Expired).is_ok() {
                self.finalize(entry);
                return true;
            }
        }
        false
    }

    fn transition<F>(self: &Arc<Self>, id: SessionId, action: &'static str, apply: F) -> bool
    where
        F: FnOnce(&Arc<Self>, &mut SessionEntry) -> Result<(), SessionError>,
    {
        let now = Instant::now();
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(&id) else {
            debug!(session = %id, action, "unknown session");
            return false;
        };
        if self.advance(entry, now) {
            debug!(session = %id, action, "session expired before the request");
            return false;
        }
        match apply(self, entry) {
            Ok(()) => true,
            Err(err) => {
                debug!(session = %id, action, error = %err, "transition rejected");
                false
            }
        }
    }

    fn arm_timers(self: &Arc<Self>, id: SessionId, entry: &mut SessionEntry) {
        entry.generation += 1;
        let generation = entry.generation;

        let armed_at = entry.mark;
        let deadline = armed_at + entry.session.remaining();
        let weak = Arc::downgrade(self);
        entry.timers.start_countdown(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_countdown(id, generation);
            }
        });

        let Some(repo) = self.hooks.snapshots.clone() else {
            return;
        };
        let period = self.settings.autosave_interval();
        let first_save = armed_at + period;
        let weak = Arc::downgrade(self);
        entry.timers.start_autosave(async move {
            let mut ticker = tokio::time::interval_at(first_save, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let due = ticker.tick().await;
                let Some(snapshot) = weak
                    .upgrade()
                    .and_then(|inner| inner.snapshot_for_save(id, due))
                else {
                    break;
                };
                match repo.save_snapshot(&snapshot).await {
                    Ok(()) => {
                        if let Some(inner) = weak.upgrade() {
                            inner.mark_saved(id);
                        }
                        debug!(session = %id, "autosaved");
                    }
                    Err(err) => warn!(session = %id, error = %err, "autosave failed"),
                }
            }
        });
    }

    fn on_countdown(&self, id: SessionId, generation: u64) {
        let now = Instant::now();
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(&id) else {
            return;
        };
        if entry.generation != generation || !entry.session.is_active() {
            debug!(session = %id, "stale countdown ignored");
            return;
        }
        entry.settle(now);
        info!(session = %id, "time limit reached");
        if entry.session.complete(CompletionReason::Expired).is_ok() {
            self.finalize(entry);
        }
    }

    /// Settle the session up to the tick's due instant and clone it for saving.
    fn snapshot_for_save(&self, id: SessionId, due: Instant) -> Option<ExamSession> {
        let mut sessions = self.lock();
        let entry = sessions.get_mut(&id)?;
        let at = due.max(entry.mark);
        entry.settle(at);
        Some(entry.session.clone())
    }

    fn mark_saved(&self, id: SessionId) {
        let at = self.clock.now();
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.last_saved_at = Some(at);
        }
    }

    /// Stop the timers this completion ends, build the result and publish it.
    fn finalize(&self, entry: &mut SessionEntry) {
        let reason = match entry.session.status() {
            SessionStatus::Completed(reason) => reason,
            SessionStatus::Active | SessionStatus::Paused => return,
        };
        if reason == CompletionReason::Early {
            entry.timers.cancel_countdown();
        } else {
            entry.timers.cancel_all();
        }
        entry.generation += 1;

        let result = entry.session.build_result(self.clock.now());
        info!(
            session = %result.session_id,
            reason = ?reason,
            correct = result.correct_answers,
            total = result.total_questions,
            "session completed"
        );
        if let Some(tx) = &self.hooks.completions {
            if tx.send(result.clone()).is_err() {
                debug!(session = %result.session_id, "completion receiver dropped");
            }
        }
        entry.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::fixtures::question;
    use exam_core::model::Topic;
    use exam_core::time::fixed_clock;

    fn engine(limit_secs: u64) -> SessionEngine {
        SessionEngine::new(fixed_clock(), SessionSettings::new(limit_secs, 30).unwrap())
    }

    fn questions(n: u64) -> Vec<Question> {
        (1..=n).map(|id| question(id, Topic::DataGovernance)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn settle_charges_only_active_time() {
        let engine = engine(600);
        let session = engine
            .start(UserId::new(1), ExamKind::Practice, questions(2))
            .unwrap();
        let id = session.id();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(engine.pause(id));
        tokio::time::advance(Duration::from_secs(500)).await;
        assert!(engine.resume(id));
        tokio::time::advance(Duration::from_secs(5)).await;

        let response = engine.submit_answer(id, QuestionId::new(1), 0).unwrap();
        assert_eq!(response.time_spent_secs, 25);
        assert_eq!(engine.view(id).unwrap().remaining_secs, 575);
    }

    #[tokio::test]
    async fn start_rejects_empty_question_list() {
        let engine = engine(60);
        assert_eq!(
            engine
                .start(UserId::new(1), ExamKind::Practice, Vec::new())
                .unwrap_err(),
            SessionError::Empty
        );
        assert!(engine.is_empty());
    }
}
