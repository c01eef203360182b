use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in deadline for timeouts too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline handed to a task body together with a cancellation token.
///
/// The engine cancels the token when it gives up waiting on a unit. Bodies
/// run each cluster call through [`DeadlineSignal::guard`] so the call is
/// dropped at the deadline or on cancellation, whichever comes first.
#[derive(Debug, Clone)]
pub struct DeadlineSignal {
    deadline: Instant,
    token: CancellationToken,
}

impl DeadlineSignal {
    /// A signal expiring `timeout` from now, capped at roughly thirty years
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            deadline: now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now),
            token: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled or past the deadline
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Runs `fut` until it completes, the deadline passes or the signal is
    /// cancelled. The future is dropped in the latter two cases.
    pub async fn guard<T, E, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(anyhow!("{} cancelled", what)),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner.map_err(Into::into),
                Err(_) => Err(anyhow!("{} exceeded its deadline", what)),
            },
        }
    }
}
