// tests/common/mod.rs — Shared fixtures: an in-memory session backend

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use chefkix_session::core::types::{CookingSession, RecipeStep, RecipeSummary, SessionStatus};
use chefkix_session::gateway::{AdvanceRequest, SessionGateway};
use chefkix_session::infra::errors::SessionError;

/// An in-memory stand-in for the session backend: one session of record
/// per user, the conflict rule, and the completion reward. Mirrors the
/// JSON/HTTP contract the real gateway speaks.
pub struct InMemoryGateway {
    recipes: HashMap<String, RecipeSummary>,
    state: Mutex<Option<CookingSession>>,
    pub create_calls: AtomicU32,
    create_delay: Duration,
}

impl InMemoryGateway {
    pub fn new(recipes: Vec<(&str, RecipeSummary)>) -> Self {
        Self {
            recipes: recipes
                .into_iter()
                .map(|(id, r)| (id.to_string(), r))
                .collect(),
            state: Mutex::new(None),
            create_calls: AtomicU32::new(0),
            create_delay: Duration::ZERO,
        }
    }

    /// Make `create_session` slow enough for a double-click to overlap.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Seed the backend with an already-running session (another device).
    pub fn seed_session(&self, session: CookingSession) {
        *self.state.lock().unwrap() = Some(session);
    }

    pub fn session_of_record(&self) -> Option<CookingSession> {
        self.state.lock().unwrap().clone()
    }

    fn mutate(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut CookingSession),
    ) -> Result<CookingSession, SessionError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .as_mut()
            .filter(|s| s.session_id == session_id)
            .ok_or(SessionError::NoActiveSession)?;
        f(session);
        Ok(session.clone())
    }
}

#[async_trait]
impl SessionGateway for InMemoryGateway {
    async fn create_session(&self, recipe_id: &str) -> Result<CookingSession, SessionError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let recipe = self
            .recipes
            .get(recipe_id)
            .cloned()
            .ok_or_else(|| SessionError::Gateway {
                message: format!("unknown recipe '{recipe_id}'"),
                retriable: false,
            })?;

        let mut state = self.state.lock().unwrap();
        if let Some(active) = state.as_ref().filter(|s| s.is_active()) {
            return Err(SessionError::Conflict {
                recipe_id: recipe_id.to_string(),
                active_recipe_id: active.recipe_id.clone(),
            });
        }

        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let session = CookingSession {
            session_id: format!("sess-{n}"),
            recipe_id: recipe_id.to_string(),
            current_step: 1,
            completed_steps: BTreeSet::new(),
            status: Some(SessionStatus::InProgress),
            pending_xp: 0,
            completed_at: None,
            post_deadline: None,
            step_started_at: Some(Utc::now()),
            recipe,
        };
        *state = Some(session.clone());
        Ok(session)
    }

    async fn fetch_current_session(&self) -> Result<Option<CookingSession>, SessionError> {
        Ok(self.session_of_record().filter(|s| s.is_active()))
    }

    async fn advance_to_step(
        &self,
        session_id: &str,
        request: AdvanceRequest,
    ) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, |s| {
            s.current_step = request.target_step;
            s.completed_steps = request.completed_steps.clone();
            s.step_started_at = Some(Utc::now());
        })
    }

    async fn pause_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, |s| s.status = Some(SessionStatus::Paused))
    }

    async fn resume_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, |s| s.status = Some(SessionStatus::InProgress))
    }

    async fn complete_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, |s| {
            s.status = Some(SessionStatus::Completed);
            s.completed_at = Some(Utc::now());
            s.post_deadline = Some(Utc::now() + chrono::Duration::hours(24));
            // Finishing counts the step the cook was standing on.
            let final_step = s.current_step;
            s.completed_steps.insert(final_step);
            s.pending_xp = 100 + 10 * s.completed_steps.len() as u32;
        })
    }

    async fn abandon_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, |s| {
            s.status = Some(SessionStatus::Abandoned);
            s.completed_at = Some(Utc::now());
        })
    }
}

/// A three-step recipe with no declared durations.
pub fn untimed_recipe() -> RecipeSummary {
    RecipeSummary {
        title: "Tomato salad".into(),
        cover_image_url: None,
        total_steps: 3,
        steps: vec![
            step(1, "Slice the tomatoes", None),
            step(2, "Dress with oil and salt", None),
            step(3, "Serve", None),
        ],
    }
}

/// A recipe whose first step declares a five-second countdown.
pub fn five_second_recipe() -> RecipeSummary {
    RecipeSummary {
        title: "Blanched peas".into(),
        cover_image_url: None,
        total_steps: 2,
        steps: vec![
            step(1, "Blanch the peas", Some(5)),
            step(2, "Shock in ice water", None),
        ],
    }
}

pub fn step(number: u32, instruction: &str, duration_secs: Option<u32>) -> RecipeStep {
    RecipeStep {
        number,
        instruction: instruction.into(),
        duration_secs,
    }
}
