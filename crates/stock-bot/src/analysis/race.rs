//! Race a task against a time budget without cancelling it

use std::future::Future;
use std::time::Duration;

/// Outcome of [`race_or_detach`]
#[derive(Debug, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    /// The task finished within the budget
    Finished(T),
    /// The task panicked or was aborted
    Failed(String),
    /// The budget ran out; the task keeps running on its own
    Detached,
}

/// Spawn `future` and wait for it at most `budget`
///
/// Dropping a tokio `JoinHandle` detaches the task instead of aborting it, so
/// a task that loses the race still runs to completion and can report through
/// side effects such as a cache write.
pub async fn race_or_detach<F>(future: F, budget: Duration) -> RaceOutcome<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(future);
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(output)) => RaceOutcome::Finished(output),
        Ok(Err(join_error)) => RaceOutcome::Failed(join_error.to_string()),
        Err(_elapsed) => RaceOutcome::Detached,
    }
}
