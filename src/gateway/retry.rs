// src/gateway/retry.rs — Retry-once decorator for the session gateway
//
// The app's HTTP layer retries a failed request exactly once after its
// token-refresh pass; the session gateway inherits that contract. Only
// transient failures are retried — a conflict answer is final.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{AdvanceRequest, SessionGateway};
use crate::core::types::CookingSession;
use crate::infra::errors::SessionError;

const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct RetryGateway {
    inner: Arc<dyn SessionGateway>,
    delay: Duration,
}

impl RetryGateway {
    pub fn new(inner: Arc<dyn SessionGateway>) -> Self {
        Self {
            inner,
            delay: RETRY_DELAY,
        }
    }

    pub fn with_delay(inner: Arc<dyn SessionGateway>, delay: Duration) -> Self {
        Self { inner, delay }
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, SessionError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, SessionError>>,
    {
        match call().await {
            Ok(value) => Ok(value),
            Err(first) if first.is_retriable() => {
                tracing::warn!(operation, "Retrying once after transient error: {}", first);
                tokio::time::sleep(self.delay).await;
                call().await
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SessionGateway for RetryGateway {
    async fn create_session(&self, recipe_id: &str) -> Result<CookingSession, SessionError> {
        self.run("create_session", || self.inner.create_session(recipe_id))
            .await
    }

    async fn fetch_current_session(&self) -> Result<Option<CookingSession>, SessionError> {
        self.run("fetch_current_session", || {
            self.inner.fetch_current_session()
        })
        .await
    }

    async fn advance_to_step(
        &self,
        session_id: &str,
        request: AdvanceRequest,
    ) -> Result<CookingSession, SessionError> {
        self.run("advance_to_step", || {
            self.inner.advance_to_step(session_id, request.clone())
        })
        .await
    }

    async fn pause_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.run("pause_session", || self.inner.pause_session(session_id))
            .await
    }

    async fn resume_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.run("resume_session", || self.inner.resume_session(session_id))
            .await
    }

    async fn complete_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.run("complete_session", || self.inner.complete_session(session_id))
            .await
    }

    async fn abandon_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.run("abandon_session", || self.inner.abandon_session(session_id))
            .await
    }
}
