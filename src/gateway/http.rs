// src/gateway/http.rs — HTTP implementation of the session gateway

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use super::{AdvanceRequest, ConflictBody, SessionGateway};
use crate::core::types::CookingSession;
use crate::infra::config::GatewayConfig;
use crate::infra::errors::SessionError;

pub struct HttpSessionGateway {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpSessionGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, SessionError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SessionError::Config(format!("invalid gateway base URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        self.base_url
            .join(path)
            .map_err(|e| SessionError::Config(format!("invalid gateway path '{path}': {e}")))
    }

    fn transport_error(e: reqwest::Error) -> SessionError {
        SessionError::Gateway {
            message: e.to_string(),
            retriable: e.is_timeout() || e.is_connect(),
        }
    }

    /// Map a non-success response to the error taxonomy. 409 is the
    /// conflict contract; 5xx is retriable; the remaining 4xx are not.
    async fn error_from_response(
        recipe_id: Option<&str>,
        response: reqwest::Response,
    ) -> SessionError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::CONFLICT {
            let conflict: ConflictBody = serde_json::from_str(&body).unwrap_or_default();
            return SessionError::Conflict {
                recipe_id: recipe_id.unwrap_or_default().to_string(),
                active_recipe_id: conflict.active_recipe_id.unwrap_or_default(),
            };
        }

        let message = serde_json::from_str::<ConflictBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("HTTP {status}"));

        SessionError::Gateway {
            message,
            retriable: status.is_server_error(),
        }
    }

    async fn parse_session(response: reqwest::Response) -> Result<CookingSession, SessionError> {
        response
            .json::<CookingSession>()
            .await
            .map_err(|e| SessionError::Gateway {
                message: format!("malformed session payload: {e}"),
                retriable: false,
            })
    }

    /// POST a lifecycle mutation and parse the authoritative session back.
    async fn mutate(
        &self,
        session_id: &str,
        action: &str,
        body: Option<&AdvanceRequest>,
    ) -> Result<CookingSession, SessionError> {
        let url = self.endpoint(&format!("/v1/sessions/{session_id}/{action}"))?;
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(None, response).await);
        }
        Self::parse_session(response).await
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn create_session(&self, recipe_id: &str) -> Result<CookingSession, SessionError> {
        let url = self.endpoint("/v1/sessions")?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "recipeId": recipe_id }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(Some(recipe_id), response).await);
        }
        Self::parse_session(response).await
    }

    async fn fetch_current_session(&self) -> Result<Option<CookingSession>, SessionError> {
        let url = self.endpoint("/v1/sessions/current")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(Self::parse_session(response).await?)),
            _ => Err(Self::error_from_response(None, response).await),
        }
    }

    async fn advance_to_step(
        &self,
        session_id: &str,
        request: AdvanceRequest,
    ) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, "advance", Some(&request)).await
    }

    async fn pause_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, "pause", None).await
    }

    async fn resume_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, "resume", None).await
    }

    async fn complete_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, "complete", None).await
    }

    async fn abandon_session(&self, session_id: &str) -> Result<CookingSession, SessionError> {
        self.mutate(session_id, "abandon", None).await
    }
}
