//! Partial-failure-tolerant fan-out.
//!
//! Runs a batch of independent fallible operations concurrently and keeps,
//! for each input position, either the value or nothing. A failed item never
//! aborts the batch and is never surfaced as an error; it is logged at
//! `debug` and counted.
//!
//! # Example
//!
//! ```ignore
//! use livetransit::fanout::FanoutJoin;
//!
//! let join = FanoutJoin::run(
//!     trips.iter().map(|t| service.vehicle_position(&t.trip_id, 84_600)),
//!     0,
//! )
//! .await;
//!
//! let usable: Vec<_> = join.into_values().filter(|p| p.is_usable()).collect();
//! ```

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::debug;

/// Outcome of a fan-out batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutJoin<T> {
    outcomes: Vec<Option<T>>,
    failures: usize,
}

impl<T> FanoutJoin<T> {
    /// Run `ops` and collect their outcomes.
    ///
    /// With `concurrency == 0` every operation is in flight at once;
    /// otherwise at most `concurrency` are. Output order always matches
    /// input order.
    pub async fn run<I, F, E>(ops: I, concurrency: usize) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let results: Vec<Result<T, E>> = if concurrency == 0 {
            futures::future::join_all(ops).await
        } else {
            stream::iter(ops).buffered(concurrency).collect().await
        };

        let mut failures = 0;
        let outcomes = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(index, error = %e, "Fan-out item failed");
                    failures += 1;
                    None
                }
            })
            .collect();

        Self { outcomes, failures }
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of items that failed.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Number of items that succeeded.
    pub fn successes(&self) -> usize {
        self.outcomes.len() - self.failures
    }

    /// True iff the batch is non-empty and every item failed.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failures == self.outcomes.len()
    }

    /// Per-item outcomes, `None` where the item failed.
    pub fn outcomes(&self) -> &[Option<T>] {
        &self.outcomes
    }

    /// Consume into per-item outcomes.
    pub fn into_outcomes(self) -> Vec<Option<T>> {
        self.outcomes
    }

    /// Consume into the successful values, in input order.
    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.outcomes.into_iter().flatten()
    }
}
