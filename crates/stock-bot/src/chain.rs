//! Ordered fallback chains
//!
//! Both the symbol resolver and the quote fetcher are lists of [`Strategy`]
//! objects run by [`first_success`]. A strategy answers `Ok(Some(_))` when it
//! produced a result, `Ok(None)` when it does not apply to the input, and
//! `Err(_)` when it tried and failed. Failures are logged and never abort the
//! chain. A chain run against a deadline cuts off the attempt in progress
//! when the deadline passes and skips the strategies after it.

use crate::error::{Result, StockError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One step of a fallback chain
#[async_trait]
pub trait Strategy<I: ?Sized + Sync, O: Send>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Try to produce an output for `input`
    async fn attempt(&self, input: &I) -> Result<Option<O>>;
}

/// A chain of strategies tried in order
pub type Chain<I, O> = Vec<Arc<dyn Strategy<I, O>>>;

/// Run `chain` in order and return the first produced output
pub async fn first_success<I, O>(chain: &[Arc<dyn Strategy<I, O>>], input: &I) -> Option<O>
where
    I: ?Sized + Sync + std::fmt::Debug,
    O: Send,
{
    first_success_until(chain, input, None).await
}

/// Like [`first_success`], but no attempt runs past `deadline`
pub async fn first_success_until<I, O>(
    chain: &[Arc<dyn Strategy<I, O>>],
    input: &I,
    deadline: Option<Instant>,
) -> Option<O>
where
    I: ?Sized + Sync + std::fmt::Debug,
    O: Send,
{
    for strategy in chain {
        let outcome = match deadline {
            None => strategy.attempt(input).await,
            Some(deadline) => {
                let started = Instant::now();
                if started >= deadline {
                    warn!(strategy = strategy.name(), ?input, "deadline reached, skipping rest of chain");
                    return None;
                }
                tokio::time::timeout_at(deadline, strategy.attempt(input))
                    .await
                    .unwrap_or_else(|_| Err(StockError::timeout(strategy.name(), started.elapsed())))
            }
        };

        match outcome {
            Ok(Some(output)) => {
                debug!(strategy = strategy.name(), ?input, "strategy succeeded");
                return Some(output);
            }
            Ok(None) => {
                debug!(strategy = strategy.name(), ?input, "strategy had no answer");
            }
            Err(e) => {
                warn!(strategy = strategy.name(), ?input, error = %e, "strategy failed");
            }
        }
    }
    None
}
