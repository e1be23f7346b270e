// src/core/store.rs — The session store: single owner of cooking state
//
// Owns the one active session and its timer map. Presentation surfaces
// read published snapshots and call lifecycle operations; nothing else
// mutates session or timer state. Gateway-backed operations share one
// in-flight guard so concurrent mutations of the same session cannot
// interleave (a double-clicked "Start Cooking" issues one request).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use crate::core::timer::{self, TimerKey, TimerMap, TimerTransition};
use crate::core::types::{CookingSession, SessionSnapshot, SessionStatus};
use crate::gateway::{AdvanceRequest, SessionGateway};
use crate::infra::config::TimersConfig;
use crate::infra::errors::SessionError;
use crate::infra::storage::SnapshotStore;

/// Which lifecycle operation is currently in flight, for surface spinners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Advance,
    Pause,
    Resume,
    Complete,
    Abandon,
    Sync,
}

impl LifecycleOp {
    fn name(self) -> &'static str {
        match self {
            LifecycleOp::Start => "start_cooking",
            LifecycleOp::Advance => "advance_step",
            LifecycleOp::Pause => "pause_session",
            LifecycleOp::Resume => "resume_session",
            LifecycleOp::Complete => "complete_session",
            LifecycleOp::Abandon => "abandon_session",
            LifecycleOp::Sync => "resume_existing_session",
        }
    }
}

/// The snapshot surfaces render from. Published on every change.
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    pub session: Option<CookingSession>,
    pub timers: TimerMap,
    pub loading: Option<LifecycleOp>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    session: Option<CookingSession>,
    timers: TimerMap,
    /// Timers frozen by `pause_session`, so `resume_session` restarts
    /// exactly those and not ones the user paused individually.
    frozen_by_pause: Vec<TimerKey>,
    loading: Option<LifecycleOp>,
    last_error: Option<String>,
}

impl StoreState {
    fn view(&self) -> StoreView {
        StoreView {
            session: self.session.clone(),
            timers: self.timers.clone(),
            loading: self.loading,
            last_error: self.last_error.clone(),
        }
    }
}

pub struct SessionStore {
    gateway: Arc<dyn SessionGateway>,
    snapshots: SnapshotStore,
    urgent_threshold_secs: u32,
    state: Mutex<StoreState>,
    view_tx: watch::Sender<StoreView>,
    transition_tx: broadcast::Sender<TimerTransition>,
    mutation_in_flight: AtomicBool,
}

/// Releases the shared mutation guard when an operation ends, including
/// on early returns.
struct MutationGuard<'a>(&'a AtomicBool);

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionStore {
    /// Build the store, restoring any device-local fragment as a partial
    /// session for the recovery coordinator to reconcile.
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        snapshots: SnapshotStore,
        timers: &TimersConfig,
    ) -> Self {
        let restored = snapshots.load().map(SessionSnapshot::into_partial_session);
        if let Some(ref partial) = restored {
            tracing::info!(
                session_id = %partial.session_id,
                "Restored partial session fragment from device storage"
            );
        }

        let state = StoreState {
            session: restored,
            ..StoreState::default()
        };
        let (view_tx, _) = watch::channel(state.view());
        let (transition_tx, _) = broadcast::channel(64);

        Self {
            gateway,
            snapshots,
            urgent_threshold_secs: timers.urgent_threshold_secs,
            state: Mutex::new(state),
            view_tx,
            transition_tx,
            mutation_in_flight: AtomicBool::new(false),
        }
    }

    // ─── Read side ──────────────────────────────────────────────

    /// Latest published snapshot.
    pub fn current(&self) -> StoreView {
        self.view_tx.borrow().clone()
    }

    /// Subscribe to state changes (presentation surfaces).
    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.view_tx.subscribe()
    }

    /// Subscribe to timer transitions (notification effects).
    pub fn transitions(&self) -> broadcast::Receiver<TimerTransition> {
        self.transition_tx.subscribe()
    }

    /// The ticking authority runs only while a session exists and at
    /// least one timer is in the active map.
    pub fn has_ticking_work(&self) -> bool {
        let state = self.state.lock().expect("session state poisoned");
        state.session.is_some() && !state.timers.is_empty()
    }

    // ─── Lifecycle operations ───────────────────────────────────

    pub async fn start_cooking(&self, recipe_id: &str) -> Result<(), SessionError> {
        let _guard = self.begin(LifecycleOp::Start)?;

        // The gateway would reject this too; don't even attempt it.
        {
            let state = self.state.lock().expect("session state poisoned");
            if let Some(session) = state.session.as_ref().filter(|s| s.is_active()) {
                if session.recipe_id == recipe_id {
                    // Already cooking this recipe; nothing to start.
                    return Ok(());
                }
                let err = SessionError::Conflict {
                    recipe_id: recipe_id.to_string(),
                    active_recipe_id: session.recipe_id.clone(),
                };
                drop(state);
                self.record_failure(LifecycleOp::Start, &err);
                return Err(err);
            }
        }

        self.set_loading(LifecycleOp::Start);

        match self.gateway.create_session(recipe_id).await {
            Ok(session) => {
                tracing::info!(session_id = %session.session_id, recipe_id, "Cooking session started");
                let snapshot = SessionSnapshot::of(&session);
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    state.timers = session
                        .current_step_spec()
                        .map(timer::seed_for_step)
                        .unwrap_or_default();
                    state.frozen_by_pause.clear();
                    state.session = Some(session);
                    state.loading = None;
                    state.last_error = None;
                    self.publish(&state);
                }
                self.persist(&snapshot);
                Ok(())
            }
            Err(e) => {
                self.record_failure(LifecycleOp::Start, &e);
                Err(e)
            }
        }
    }

    /// Advance to the next step of the recipe.
    pub async fn advance_step(&self) -> Result<(), SessionError> {
        let target = {
            let state = self.state.lock().expect("session state poisoned");
            let session = state
                .session
                .as_ref()
                .filter(|s| s.is_active())
                .ok_or(SessionError::NoActiveSession)?;
            session.current_step + 1
        };
        self.go_to_step(target).await
    }

    /// Move to an arbitrary step. Idempotent: a repeated call with the
    /// current step is a no-op and touches neither timers nor the gateway.
    pub async fn go_to_step(&self, target: u32) -> Result<(), SessionError> {
        let _guard = self.begin(LifecycleOp::Advance)?;

        // Optimistic local move, remembered for rollback.
        let (prior, destroyed, request) = {
            let mut state = self.state.lock().expect("session state poisoned");
            let session = state
                .session
                .as_ref()
                .filter(|s| s.is_active())
                .ok_or(SessionError::NoActiveSession)?;

            if target == session.current_step {
                return Ok(());
            }
            let total = session.recipe.total_steps;
            if target < 1 || target > total {
                let err = SessionError::InvalidStep {
                    requested: target,
                    total,
                };
                drop(state);
                self.record_failure(LifecycleOp::Advance, &err);
                return Err(err);
            }

            let prior = (
                state.session.clone(),
                state.timers.clone(),
                state.frozen_by_pause.clone(),
            );

            let session = state.session.as_mut().expect("checked above");
            let left_behind = session.current_step;
            session.completed_steps.insert(left_behind);
            session.current_step = target;
            session.step_started_at = Some(Utc::now());

            let destroyed: Vec<TimerKey> = state.timers.keys().copied().collect();
            let paused = state.session.as_ref().and_then(|s| s.status)
                == Some(SessionStatus::Paused);
            let mut seeded = state
                .session
                .as_ref()
                .and_then(|s| s.current_step_spec())
                .map(timer::seed_for_step)
                .unwrap_or_default();
            // Changing steps while paused keeps the new timers frozen too.
            state.frozen_by_pause.clear();
            if paused {
                for (key, t) in seeded.iter_mut() {
                    t.running = false;
                    state.frozen_by_pause.push(*key);
                }
            }
            state.timers = seeded;

            let request = AdvanceRequest {
                target_step: target,
                completed_steps: state
                    .session
                    .as_ref()
                    .expect("checked above")
                    .completed_steps
                    .clone(),
            };
            state.loading = Some(LifecycleOp::Advance);
            state.last_error = None;
            self.publish(&state);
            (prior, destroyed, request)
        };

        let session_id = prior
            .0
            .as_ref()
            .map(|s| s.session_id.clone())
            .unwrap_or_default();

        match self.gateway.advance_to_step(&session_id, request).await {
            Ok(remote) => {
                let snapshot = SessionSnapshot::of(&remote);
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    state.session = Some(remote);
                    state.loading = None;
                    self.publish(&state);
                }
                for key in destroyed {
                    self.emit(TimerTransition::Destroyed { key });
                }
                self.persist(&snapshot);
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    state.session = prior.0;
                    state.timers = prior.1;
                    state.frozen_by_pause = prior.2;
                    state.loading = None;
                    state.last_error = Some(e.user_message());
                    self.publish(&state);
                }
                Err(e)
            }
        }
    }

    /// Pause the session, freezing every running timer in place.
    pub async fn pause_session(&self) -> Result<(), SessionError> {
        let _guard = self.begin(LifecycleOp::Pause)?;

        let (prior, session_id) = {
            let mut state = self.state.lock().expect("session state poisoned");
            let session = state
                .session
                .as_ref()
                .filter(|s| s.is_active())
                .ok_or(SessionError::NoActiveSession)?;
            if session.status == Some(SessionStatus::Paused) {
                return Ok(());
            }
            let prior = (state.session.clone(), state.frozen_by_pause.clone());
            let session_id = session.session_id.clone();

            if let Some(session) = state.session.as_mut() {
                session.status = Some(SessionStatus::Paused);
            }
            let frozen: Vec<TimerKey> = state
                .timers
                .iter()
                .filter(|(_, t)| t.running)
                .map(|(k, _)| *k)
                .collect();
            for key in &frozen {
                if let Some(t) = state.timers.get_mut(key) {
                    t.running = false;
                }
            }
            state.frozen_by_pause = frozen;
            state.loading = Some(LifecycleOp::Pause);
            state.last_error = None;
            self.publish(&state);
            (prior, session_id)
        };

        match self.gateway.pause_session(&session_id).await {
            Ok(remote) => {
                self.reconcile_remote(remote);
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    state.session = prior.0;
                    // Thaw exactly the timers this call froze.
                    let frozen: Vec<TimerKey> =
                        state.frozen_by_pause.drain(..).collect();
                    for key in frozen {
                        if let Some(t) = state.timers.get_mut(&key) {
                            t.running = true;
                        }
                    }
                    state.frozen_by_pause = prior.1;
                    state.loading = None;
                    state.last_error = Some(e.user_message());
                    self.publish(&state);
                }
                Err(e)
            }
        }
    }

    /// Resume a paused session, restarting exactly the timers the pause froze.
    pub async fn resume_session(&self) -> Result<(), SessionError> {
        let _guard = self.begin(LifecycleOp::Resume)?;

        let (prior, session_id) = {
            let mut state = self.state.lock().expect("session state poisoned");
            let session = state
                .session
                .as_ref()
                .filter(|s| s.is_active())
                .ok_or(SessionError::NoActiveSession)?;
            if session.status == Some(SessionStatus::InProgress) {
                return Ok(());
            }
            let prior = (state.session.clone(), state.frozen_by_pause.clone());
            let session_id = session.session_id.clone();

            if let Some(session) = state.session.as_mut() {
                session.status = Some(SessionStatus::InProgress);
            }
            let frozen: Vec<TimerKey> = state.frozen_by_pause.drain(..).collect();
            for key in frozen {
                if let Some(t) = state.timers.get_mut(&key) {
                    if !t.elapsed {
                        t.running = true;
                    }
                }
            }
            state.loading = Some(LifecycleOp::Resume);
            state.last_error = None;
            self.publish(&state);
            (prior, session_id)
        };

        match self.gateway.resume_session(&session_id).await {
            Ok(remote) => {
                self.reconcile_remote(remote);
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    state.session = prior.0;
                    for key in &prior.1 {
                        if let Some(t) = state.timers.get_mut(key) {
                            t.running = false;
                        }
                    }
                    state.frozen_by_pause = prior.1;
                    state.loading = None;
                    state.last_error = Some(e.user_message());
                    self.publish(&state);
                }
                Err(e)
            }
        }
    }

    /// Complete the session. No optimistic commit: local state is only
    /// touched once the gateway confirms, so a failed call leaves the
    /// kitchen exactly as it was.
    pub async fn complete_session(&self) -> Result<CookingSession, SessionError> {
        let _guard = self.begin(LifecycleOp::Complete)?;
        let (session_id, final_step) = self.require_active()?;

        self.set_loading(LifecycleOp::Complete);

        match self.gateway.complete_session(&session_id).await {
            Ok(mut remote) => {
                // Leaving a step completes it; finishing completes the
                // final step the user was standing on.
                remote.completed_steps.insert(final_step);
                tracing::info!(
                    session_id = %remote.session_id,
                    pending_xp = remote.pending_xp,
                    "Cooking session completed"
                );
                self.finish_session(remote.clone());
                Ok(remote)
            }
            Err(e) => {
                self.record_failure(LifecycleOp::Complete, &e);
                Err(e)
            }
        }
    }

    /// Abandon the session. Clears timers and the device fragment; no XP.
    pub async fn abandon_session(&self) -> Result<(), SessionError> {
        let _guard = self.begin(LifecycleOp::Abandon)?;
        let (session_id, _) = self.require_active()?;

        self.set_loading(LifecycleOp::Abandon);

        match self.gateway.abandon_session(&session_id).await {
            Ok(remote) => {
                tracing::info!(session_id = %remote.session_id, "Cooking session abandoned");
                self.finish_session(remote);
                Ok(())
            }
            Err(e) => {
                self.record_failure(LifecycleOp::Abandon, &e);
                Err(e)
            }
        }
    }

    /// Reconcile local state against the backend's current session.
    ///
    /// The only operation allowed to start from a partial fragment, and it
    /// always ends by replacing it with the remote session or discarding
    /// it. Timer remaining-times are rebuilt from the server-recorded step
    /// start, so a long tab-hide does not leave timers frozen in the past.
    pub async fn resume_existing_session(&self) -> Result<bool, SessionError> {
        let _guard = self.begin(LifecycleOp::Sync)?;
        self.set_loading(LifecycleOp::Sync);

        match self.gateway.fetch_current_session().await {
            Ok(Some(remote)) if remote.is_active() => {
                let snapshot = SessionSnapshot::of(&remote);
                let now = Utc::now();
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    let paused = remote.status == Some(SessionStatus::Paused);
                    let mut timers = remote
                        .current_step_spec()
                        .map(timer::seed_for_step)
                        .unwrap_or_default();
                    for t in timers.values_mut() {
                        if let Some(started_at) = remote.step_started_at {
                            t.remaining_secs = timer::remaining_after(t.total_secs, started_at, now);
                        }
                        if t.remaining_secs == 0 {
                            // Ran out while we were away; arrives terminal,
                            // no late alert.
                            t.elapsed = true;
                            t.running = false;
                        } else {
                            t.running = !paused;
                        }
                    }
                    state.frozen_by_pause = if paused {
                        timers
                            .iter()
                            .filter(|(_, t)| !t.elapsed)
                            .map(|(k, _)| *k)
                            .collect()
                    } else {
                        Vec::new()
                    };
                    state.timers = timers;
                    tracing::info!(
                        session_id = %remote.session_id,
                        current_step = remote.current_step,
                        "Hydrated session from backend"
                    );
                    state.session = Some(remote);
                    state.loading = None;
                    state.last_error = None;
                    self.publish(&state);
                }
                self.persist(&snapshot);
                Ok(true)
            }
            Ok(_) => {
                // Backend has nothing active; a leftover fragment is stale.
                {
                    let mut state = self.state.lock().expect("session state poisoned");
                    if state.session.as_ref().is_some_and(|s| s.is_partial()) {
                        // Internal repair, never surfaced to the user.
                        tracing::debug!("{}", SessionError::StaleLocalSession);
                        state.session = None;
                    }
                    state.loading = None;
                    self.publish(&state);
                }
                self.snapshots.clear();
                Ok(false)
            }
            Err(e) => {
                // Keep the fragment: a network failure is not "no session".
                self.record_failure(LifecycleOp::Sync, &e);
                Err(e)
            }
        }
    }

    /// Drop all local state (logout). Purely local.
    pub fn clear_local(&self) {
        let destroyed: Vec<TimerKey> = {
            let mut state = self.state.lock().expect("session state poisoned");
            let keys = state.timers.keys().copied().collect();
            state.session = None;
            state.timers.clear();
            state.frozen_by_pause.clear();
            state.loading = None;
            state.last_error = None;
            self.publish(&state);
            keys
        };
        for key in destroyed {
            self.emit(TimerTransition::Destroyed { key });
        }
        self.snapshots.clear();
    }

    // ─── Timer operations (local, no gateway) ───────────────────

    /// Advance all running timers by one second. Pure local computation;
    /// cannot fail. Returns the transitions for callers that want them
    /// synchronously (they are also broadcast).
    pub fn tick_timers(&self) -> Vec<TimerTransition> {
        let transitions = {
            let mut state = self.state.lock().expect("session state poisoned");
            if state.session.is_none() {
                return Vec::new();
            }
            let timers = std::mem::take(&mut state.timers);
            let outcome = timer::tick(timers, self.urgent_threshold_secs);
            state.timers = outcome.timers;
            self.publish(&state);
            outcome.transitions
        };
        for t in &transitions {
            self.emit(t.clone());
        }
        transitions
    }

    pub fn start_timer(&self, key: TimerKey) {
        let mut state = self.state.lock().expect("session state poisoned");
        if let Some(t) = state.timers.get_mut(&key) {
            if !t.elapsed {
                t.running = true;
            }
        }
        self.publish(&state);
    }

    pub fn pause_timer(&self, key: TimerKey) {
        let mut state = self.state.lock().expect("session state poisoned");
        if let Some(t) = state.timers.get_mut(&key) {
            t.running = false;
        }
        self.publish(&state);
    }

    pub fn reset_timer(&self, key: TimerKey) {
        let found = {
            let mut state = self.state.lock().expect("session state poisoned");
            let found = if let Some(t) = state.timers.get_mut(&key) {
                t.reset();
                true
            } else {
                false
            };
            self.publish(&state);
            found
        };
        if found {
            self.emit(TimerTransition::Reset { key });
        }
    }

    pub fn set_timer_muted(&self, key: TimerKey, muted: bool) {
        let mut state = self.state.lock().expect("session state poisoned");
        if let Some(t) = state.timers.get_mut(&key) {
            t.muted = muted;
        }
        self.publish(&state);
    }

    // ─── Internals ──────────────────────────────────────────────

    fn begin(&self, op: LifecycleOp) -> Result<MutationGuard<'_>, SessionError> {
        if self
            .mutation_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::OperationInFlight {
                operation: op.name(),
            });
        }
        Ok(MutationGuard(&self.mutation_in_flight))
    }

    fn require_active(&self) -> Result<(String, u32), SessionError> {
        let state = self.state.lock().expect("session state poisoned");
        state
            .session
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| (s.session_id.clone(), s.current_step))
            .ok_or(SessionError::NoActiveSession)
    }

    fn set_loading(&self, op: LifecycleOp) {
        let mut state = self.state.lock().expect("session state poisoned");
        state.loading = Some(op);
        state.last_error = None;
        self.publish(&state);
    }

    fn record_failure(&self, op: LifecycleOp, e: &SessionError) {
        tracing::warn!(operation = op.name(), "Lifecycle operation failed: {}", e);
        let mut state = self.state.lock().expect("session state poisoned");
        state.loading = None;
        state.last_error = Some(e.user_message());
        self.publish(&state);
    }

    /// Remote answered a pause/resume mutation: its session wins.
    fn reconcile_remote(&self, remote: CookingSession) {
        let snapshot = SessionSnapshot::of(&remote);
        {
            let mut state = self.state.lock().expect("session state poisoned");
            state.session = Some(remote);
            state.loading = None;
            self.publish(&state);
        }
        self.persist(&snapshot);
    }

    /// Terminal transition (completed/abandoned): clear timers and the
    /// device fragment, keep the final session for the summary screen.
    fn finish_session(&self, remote: CookingSession) {
        let destroyed: Vec<TimerKey> = {
            let mut state = self.state.lock().expect("session state poisoned");
            let keys = state.timers.keys().copied().collect();
            state.timers.clear();
            state.frozen_by_pause.clear();
            state.session = Some(remote);
            state.loading = None;
            state.last_error = None;
            self.publish(&state);
            keys
        };
        for key in destroyed {
            self.emit(TimerTransition::Destroyed { key });
        }
        self.snapshots.clear();
    }

    fn persist(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.snapshots.save(snapshot) {
            // Recovery degrades to gateway-only; the cook goes on.
            tracing::warn!("Failed to persist session fragment: {}", e);
        }
    }

    fn publish(&self, state: &StoreState) {
        let _ = self.view_tx.send_replace(state.view());
    }

    fn emit(&self, transition: TimerTransition) {
        let _ = self.transition_tx.send(transition);
    }
}
