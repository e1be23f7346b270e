// src/core/types.rs — Cooking-session domain types
//
// The wire contract is the backend's camelCase JSON API; these types mirror
// it directly. A session without a `status` is a partial/local-only fragment
// and must be reconciled through recovery before the UI may trust it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One user's attempt at cooking a specific recipe, server-tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookingSession {
    pub session_id: String,
    pub recipe_id: String,
    /// 1-based index into the recipe's steps.
    pub current_step: u32,
    /// Steps the user has left behind; order irrelevant.
    #[serde(default)]
    pub completed_steps: BTreeSet<u32>,
    /// Absent on a partial/local-only fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// XP awarded on completion but not yet claimed via a post.
    #[serde(default)]
    pub pending_xp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Claim window after which pending XP decays; server-enforced, the
    /// client only displays a countdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deadline: Option<DateTime<Utc>>,
    /// Server-recorded start of the current step, used to rebuild timer
    /// remaining-time after a reload or a long tab-hide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recipe: RecipeSummary,
}

impl CookingSession {
    /// Active means the user is (or could be) mid-cook: in progress or paused.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            Some(SessionStatus::InProgress) | Some(SessionStatus::Paused)
        )
    }

    /// A fragment restored from device storage; never authoritative.
    pub fn is_partial(&self) -> bool {
        self.status.is_none()
    }

    /// Fraction of steps completed, for progress rings.
    pub fn progress_ratio(&self) -> f32 {
        if self.recipe.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps.len() as f32 / self.recipe.total_steps as f32
    }

    /// The current step's declared spec, if the recipe summary carries it.
    pub fn current_step_spec(&self) -> Option<&RecipeStep> {
        self.recipe
            .steps
            .iter()
            .find(|s| s.number == self.current_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

/// Denormalized recipe data for display; refreshed from the gateway,
/// read-only on the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStep {
    /// 1-based step number.
    pub number: u32,
    pub instruction: String,
    /// Declared countdown for this step, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

/// The minimal fragment persisted to device storage: enough to bootstrap
/// recovery, nothing the UI could mistake for a real session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub recipe_id: String,
}

impl SessionSnapshot {
    pub fn of(session: &CookingSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            recipe_id: session.recipe_id.clone(),
        }
    }

    /// Inflate the fragment into a partial session (no status) for the
    /// recovery coordinator to reconcile.
    pub fn into_partial_session(self) -> CookingSession {
        CookingSession {
            session_id: self.session_id,
            recipe_id: self.recipe_id,
            current_step: 1,
            completed_steps: BTreeSet::new(),
            status: None,
            pending_xp: 0,
            completed_at: None,
            post_deadline: None,
            step_started_at: None,
            recipe: RecipeSummary::default(),
        }
    }
}
