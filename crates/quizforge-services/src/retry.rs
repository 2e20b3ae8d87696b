//! Bounded retry for external calls.
//!
//! Policy (uniform across call-sites): one attempt with the full request,
//! and on failure exactly one more with a simplified request. Both attempts
//! run under the same per-call deadline. Repeated failure surfaces the last
//! error to the owning stage.

use crate::error::ServiceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Which attempt is being made. Call-sites build a cheaper request for
/// [`Attempt::Simplified`] (shorter prompt, fewer constraints).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Simplified,
}

/// Run `call` with a per-attempt deadline and one simplified retry.
pub async fn call_with_retry<T, F, Fut>(deadline: Duration, mut call: F) -> Result<T, ServiceError>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match attempt(deadline, call(Attempt::Initial)).await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "external call failed, retrying simplified");
            attempt(deadline, call(Attempt::Simplified)).await
        }
    }
}

async fn attempt<T, Fut>(deadline: Duration, fut: Fut) -> Result<T, ServiceError>
where
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(deadline.as_secs())),
    }
}
