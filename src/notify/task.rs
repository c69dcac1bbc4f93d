// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Detached, time-boxed background work

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use futures::FutureExt;
use tracing::{debug, error, warn, Instrument};

/// How a detached task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Finished with a detail string (message id, status code, ...)
    Completed(String),
    /// Returned an error or panicked
    Failed(String),
    /// Did not finish within its timeout
    TimedOut(Duration),
}

/// Run `work` in the background with its own timeout.
///
/// Nothing is returned: the caller cannot wait on, cancel, or observe the
/// task except through `report`, which is called exactly once with the
/// outcome. Errors and panics inside `work` stay inside the task.
pub fn spawn_detached<F, E, R>(name: &'static str, timeout: Duration, work: F, report: R)
where
    F: Future<Output = Result<String, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    R: FnOnce(TaskOutcome) + Send + 'static,
{
    let span = tracing::info_span!("detached", task = name);

    tokio::spawn(
        async move {
            let guarded = AssertUnwindSafe(work).catch_unwind();
            let outcome = match tokio::time::timeout(timeout, guarded).await {
                Ok(Ok(Ok(detail))) => {
                    debug!("{} finished: {}", name, detail);
                    TaskOutcome::Completed(detail)
                }
                Ok(Ok(Err(e))) => {
                    warn!("{} failed: {}", name, e);
                    TaskOutcome::Failed(e.to_string())
                }
                Ok(Err(_)) => {
                    error!("{} panicked", name);
                    TaskOutcome::Failed("task panicked".to_string())
                }
                Err(_) => {
                    warn!("{} timed out after {:?}", name, timeout);
                    TaskOutcome::TimedOut(timeout)
                }
            };
            report(outcome);
        }
        .instrument(span),
    );
}
