//! Failure boundary combinators.
//!
//! Work run under a boundary can fail by returning `Err` or by panicking.
//! Either way the failure is handed to a [`FailureReporter`] and the
//! boundary itself completes normally.

use crate::failure::FailureReporter;
use crate::failure::WorkFailure;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

pub async fn guard_future<F>(work: F, reporter: &FailureReporter)
where
    F: Future<Output = anyhow::Result<()>>,
{
    let failure = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => WorkFailure::Error(err),
        Err(payload) => WorkFailure::from_panic(&*payload),
    };
    reporter.report(&failure);
}

pub fn guard_fn<F>(work: F, reporter: &FailureReporter)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let failure = match std::panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => WorkFailure::Error(err),
        Err(payload) => WorkFailure::from_panic(&*payload),
    };
    reporter.report(&failure);
}
