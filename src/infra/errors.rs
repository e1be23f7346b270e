// src/infra/errors.rs — Error types for the session core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    // Lifecycle errors (user-recoverable, never retried automatically)
    #[error("A cooking session for recipe '{active_recipe_id}' is already active")]
    Conflict {
        recipe_id: String,
        active_recipe_id: String,
    },

    #[error("No active cooking session")]
    NoActiveSession,

    #[error("Step {requested} is out of range (recipe has {total} steps)")]
    InvalidStep { requested: u32, total: u32 },

    #[error("Another '{operation}' request is still in flight")]
    OperationInFlight { operation: &'static str },

    // Gateway errors (retriable when transport-level or 5xx)
    #[error("Session gateway error: {message}")]
    Gateway { message: String, retriable: bool },

    // Internal consistency repair — resolved by silent discard, never shown
    #[error("Local session fragment could not be confirmed against the backend")]
    StaleLocalSession,

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SessionError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, SessionError::Gateway { retriable: true, .. })
    }

    /// The message presented to the user when an operation fails.
    ///
    /// Gateway errors surface the server-reported reason when one exists;
    /// everything else falls back to the display form.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Gateway { message, .. } if !message.is_empty() => message.clone(),
            SessionError::Gateway { .. } => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_gateway_error() {
        let err = SessionError::Gateway {
            message: "HTTP 503".into(),
            retriable: true,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn test_non_retriable_gateway_error() {
        let err = SessionError::Gateway {
            message: "HTTP 400 bad request".into(),
            retriable: false,
        };
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_conflict_never_retriable() {
        let err = SessionError::Conflict {
            recipe_id: "r2".into(),
            active_recipe_id: "r1".into(),
        };
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_user_message_prefers_server_reason() {
        let err = SessionError::Gateway {
            message: "Recipe is no longer available".into(),
            retriable: false,
        };
        assert_eq!(err.user_message(), "Recipe is no longer available");
    }

    #[test]
    fn test_user_message_generic_fallback() {
        let err = SessionError::Gateway {
            message: String::new(),
            retriable: true,
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }
}
