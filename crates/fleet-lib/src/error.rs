//! Error types shared across the engine

use std::time::Duration;
use thiserror::Error;

/// Failure of an outbound call to an external collaborator
/// (inventory, pricing catalog, text model).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CollaboratorError {
    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Timeout(_) | CollaboratorError::Unavailable(_)
        )
    }
}

/// Errors surfaced to callers of the recommendation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The inventory could not be read; no partial results are produced
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(#[source] CollaboratorError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("analysis cancelled")]
    Cancelled,
}

impl EngineError {
    /// Map an inventory failure, keeping cancellation distinct
    pub fn from_inventory(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Cancelled => EngineError::Cancelled,
            other => EngineError::InventoryUnavailable(other),
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
