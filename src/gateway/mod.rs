// src/gateway/mod.rs — Remote Session Gateway client layer
//
// The backend owns the session of record. Every mutation returns the
// updated authoritative session; the store never invents one locally.

pub mod http;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::CookingSession;
use crate::infra::errors::SessionError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Create a session for a recipe. Conflicts with an existing active
    /// session surface as `SessionError::Conflict`.
    async fn create_session(&self, recipe_id: &str) -> Result<CookingSession, SessionError>;

    /// The authoritative in-progress/paused session for this user, or
    /// `None` when nothing is being cooked.
    async fn fetch_current_session(&self) -> Result<Option<CookingSession>, SessionError>;

    async fn advance_to_step(
        &self,
        session_id: &str,
        request: AdvanceRequest,
    ) -> Result<CookingSession, SessionError>;

    async fn pause_session(&self, session_id: &str) -> Result<CookingSession, SessionError>;

    async fn resume_session(&self, session_id: &str) -> Result<CookingSession, SessionError>;

    async fn complete_session(&self, session_id: &str) -> Result<CookingSession, SessionError>;

    async fn abandon_session(&self, session_id: &str) -> Result<CookingSession, SessionError>;
}

/// Body of the step-advance mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    /// 1-based target step.
    pub target_step: u32,
    /// The client's view of completed steps, echoed for reconciliation.
    pub completed_steps: BTreeSet<u32>,
}

/// Error body the backend returns on a session conflict (HTTP 409).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub active_recipe_id: Option<String>,
}
