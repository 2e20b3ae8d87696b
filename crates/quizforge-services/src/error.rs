//! Service-layer errors.

/// Errors surfaced by external collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The call did not complete within its deadline.
    #[error("external call timed out after {0}s")]
    Timeout(u64),

    /// The service could not be reached or refused the request.
    #[error("external service unavailable: {0}")]
    Unavailable(String),

    /// The service responded, but the payload failed validation.
    #[error("malformed service response: {0}")]
    Malformed(String),
}
