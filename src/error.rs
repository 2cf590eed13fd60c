//! Error types for the dispatch engine.

use thiserror::Error;

use crate::request::{RequestId, Stage};

/// Result type alias using the dispatch error type.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Main error type for the dispatch engine.
///
/// Every variant is a value the presentation layer can render. None of them
/// leave a request half-updated: an operation either applies its whole
/// transition or nothing at all.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The operation is not valid for the request's current stage
    #[error("Invalid transition: request {request_id} is in stage '{stage}', cannot {operation}")]
    InvalidTransition {
        request_id: RequestId,
        stage: Stage,
        operation: &'static str,
    },

    /// The request already reached Completed or Cancelled
    #[error("Request {request_id} is already terminal ({stage})")]
    AlreadyTerminal { request_id: RequestId, stage: Stage },

    /// A session for this request is already active
    #[error("Dispatch session already active for request {0}")]
    DuplicateSession(RequestId),

    /// No active session for this request
    #[error("No active dispatch session for request {0}")]
    NotFound(RequestId),

    /// The geocoder could not turn the position into an address
    #[error("Position could not be resolved: {0}")]
    Unresolvable(String),

    /// The geocoder did not answer in time
    #[error("Geocoding timed out for request {0}")]
    GeocodeTimeout(RequestId),

    /// No provider accepted before candidates or time ran out
    #[error("No provider accepted request {0}")]
    MatchExhausted(RequestId),

    /// The operation was interrupted because the session was cancelled
    #[error("Request cancelled: {0}")]
    RequestCancelled(RequestId),

    /// The registry is shutting down and accepts no new sessions
    #[error("Dispatch registry is shutting down")]
    Shutdown,

    /// Malformed input (coordinates out of range, implausible vehicle, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by an external collaborator
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DispatchError {
    /// Returns true if the caller may retry the same operation later.
    ///
    /// Geocoding failures leave the request in `LocationConfirm` and matching
    /// exhaustion leaves it in `MatchFailed`, so both can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Unresolvable(_) => true,
            DispatchError::GeocodeTimeout(_) => true,
            DispatchError::MatchExhausted(_) => true,
            DispatchError::InvalidTransition { .. } => false,
            DispatchError::AlreadyTerminal { .. } => false,
            DispatchError::DuplicateSession(_) => false,
            DispatchError::NotFound(_) => false,
            DispatchError::RequestCancelled(_) => false,
            DispatchError::Shutdown => false,
            DispatchError::Validation(_) => false,
            DispatchError::Serialization(_) => false,
            DispatchError::Other(_) => false,
        }
    }
}
