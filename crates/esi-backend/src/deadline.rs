//! Deadline enforcement for a single backend attempt.

use tokio::time::{timeout_at, Instant};

use crate::backend::{Backend, FetchRequest, FetchResponse};
use crate::error::FetchError;

/// Run one attempt, abandoning it at the request's deadline.
///
/// A result that arrives after the deadline is dropped with the future.
pub async fn fetch_with_deadline(
    backend: &dyn Backend,
    request: FetchRequest,
) -> Result<FetchResponse, FetchError> {
    let deadline = request.deadline;
    let budget = deadline.saturating_duration_since(Instant::now());
    match timeout_at(deadline, backend.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(budget)),
    }
}
