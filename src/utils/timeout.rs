//! Timeout utilities
//!
//! Two flavors:
//! - [`Deadline`]: a wall-clock budget polled between discrete synchronous
//!   steps. It never interrupts a step in flight.
//! - [`with_custom_timeout`]: a real async timeout, used where a step (the
//!   build subprocess) must be cancellable.

use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Budget exhausted before the named step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("budget of {budget:?} exceeded before {step} (elapsed {elapsed:?})")]
pub struct DeadlineExceeded {
    pub step: &'static str,
    pub budget: Duration,
    pub elapsed: Duration,
}

/// Polling wall-clock budget
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a budget now
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Check the budget before running `step`
    pub fn check(&self, step: &'static str) -> Result<(), DeadlineExceeded> {
        let elapsed = self.elapsed();
        if elapsed >= self.budget {
            return Err(DeadlineExceeded {
                step,
                budget: self.budget,
                elapsed,
            });
        }
        Ok(())
    }
}

/// Execute operation with custom timeout
pub async fn with_custom_timeout<F, T>(
    operation: F,
    duration: Duration,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    timeout(duration, operation).await
}
