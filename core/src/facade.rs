//! The coroutine facade.

use crate::boundary::guard_fn;
use crate::boundary::guard_future;
use crate::failure::FailureReporter;
use cofacade_engine::CoroutineId;
use cofacade_engine::Engine;
use cofacade_engine::EngineError;
use cofacade_engine::TokioEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Uniform, failure-safe access to coroutine lifecycle operations.
///
/// The facade holds no coroutine state of its own; every call goes to the
/// engine. It is cheap to clone, so build one at startup and hand clones to
/// whoever needs it.
///
/// Failures raised by work passed to [`create`](Self::create) or
/// [`defer`](Self::defer) stop at the facade: they go to the configured
/// [`FailureReporter`] and nowhere else.
#[derive(Clone)]
pub struct CoroutineFacade {
    engine: Arc<dyn Engine>,
    reporter: FailureReporter,
}

impl CoroutineFacade {
    pub fn new<E: Engine>(engine: E) -> Self {
        Self::from_shared(Arc::new(engine))
    }

    pub fn from_shared(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            reporter: FailureReporter::silent(),
        }
    }

    /// Facade over a [`TokioEngine`] for the runtime the caller runs on.
    pub fn for_current_runtime() -> Option<Self> {
        TokioEngine::try_current().map(Self::new)
    }

    pub fn with_reporter(mut self, reporter: FailureReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn reporter(&self) -> &FailureReporter {
        &self.reporter
    }

    /// Id of the running coroutine; [`CoroutineId::NONE`] outside one.
    pub fn id(&self) -> CoroutineId {
        self.engine.current_id()
    }

    pub fn in_coroutine(&self) -> bool {
        self.id().is_coroutine()
    }

    /// Parent of `id`, or of the running coroutine when `id` is `None`.
    /// [`CoroutineId::ROOT`] means "top level".
    ///
    /// Fails with [`EngineError::NotInCoroutine`] when there is nothing to
    /// default to, and with [`EngineError::Destroyed`] when `id` has already
    /// finished.
    pub fn parent_id(&self, id: Option<CoroutineId>) -> Result<CoroutineId, EngineError> {
        self.engine.parent_id(id)
    }

    /// Spawns `work` as a new coroutine and returns its id right away.
    ///
    /// Returns [`CoroutineId::NONE`] if the engine refuses to create the
    /// coroutine. What `work` later does has no influence on the result.
    ///
    /// A panic in `work` is caught like an `Err`, but the process panic hook
    /// runs before the facade sees it. The default hook prints the panic to
    /// stderr, so only `Err` failures are fully silent without a logger.
    /// Binaries that need silent panics install their own hook.
    pub fn create<F>(&self, work: F) -> CoroutineId
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let reporter = self.reporter.clone();
        let guarded = async move { guard_future(work, &reporter).await };
        match self.engine.create(Box::pin(guarded)) {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!(target: "cofacade::coroutine", error = %err, "coroutine creation failed");
                CoroutineId::NONE
            }
        }
    }

    /// Registers `work` to run when the current coroutine unwinds.
    ///
    /// Ordering among several deferred actions is up to the engine. Outside
    /// a coroutine the engine's answer is returned unchanged.
    pub fn defer<F>(&self, work: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let reporter = self.reporter.clone();
        self.engine
            .defer(Box::new(move || guard_fn(work, &reporter)))
    }

    /// Suspends the calling coroutine for `seconds`, truncated to whole
    /// microseconds.
    pub async fn sleep(&self, seconds: f64) {
        self.engine.sleep(sleep_duration(seconds)).await;
    }

    /// Blocks the calling OS thread for `seconds`, truncated to whole
    /// microseconds. For callers that are not on the runtime.
    pub fn sleep_blocking(seconds: f64) {
        std::thread::sleep(sleep_duration(seconds));
    }
}

/// Whole microseconds in `seconds`, rounded toward zero. Negative and NaN
/// inputs give zero.
pub fn sleep_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    // Float-to-int `as` truncates and saturates.
    Duration::from_micros((seconds * 1_000_000.0) as u64)
}
