//! Engine binding onto a tokio runtime.

use crate::DeferredAction;
use crate::Engine;
use crate::error::EngineError;
use crate::frame;
use crate::frame::Frame;
use crate::id::CoroutineId;
use crate::panic::panic_message;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::runtime::Handle;

/// Distinguishes frames of different engines sharing one task-local.
static NEXT_OWNER: AtomicUsize = AtomicUsize::new(1);

/// Coroutines as tokio tasks.
///
/// Every coroutine is a tokio task wrapped in a task-local frame that holds
/// its id, its parent and its deferred-action queue. Tasks spawned directly
/// with `tokio::spawn` are outside any coroutine as far as this engine is
/// concerned.
///
/// Deferred actions run when the coroutine body completes or panics, newest
/// first, inside the coroutine's context. They do not run when the task is
/// aborted, but the coroutine's bookkeeping is still reclaimed.
#[derive(Clone)]
pub struct TokioEngine {
    inner: Arc<Inner>,
}

struct Inner {
    owner: usize,
    handle: Handle,
    next_id: AtomicI64,
    /// Live coroutines mapped to their parent.
    live: Mutex<HashMap<CoroutineId, CoroutineId>>,
    max_coroutines: Option<usize>,
    shut_down: AtomicBool,
}

impl Inner {
    fn live(&self) -> MutexGuard<'_, HashMap<CoroutineId, CoroutineId>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a coroutine from the live table when its task goes away,
/// whether it finished, panicked or was dropped by the runtime.
struct Reclaim {
    inner: Arc<Inner>,
    id: CoroutineId,
}

impl Drop for Reclaim {
    fn drop(&mut self) {
        self.inner.live().remove(&self.id);
        tracing::trace!(target: "cofacade::engine", coroutine = %self.id, "coroutine reclaimed");
    }
}

impl TokioEngine {
    pub fn new(handle: Handle) -> Self {
        Self::with_limit(handle, None)
    }

    /// Engine refusing to create more than `max_coroutines` live coroutines.
    pub fn with_limit(handle: Handle, max_coroutines: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
                handle,
                next_id: AtomicI64::new(1),
                live: Mutex::new(HashMap::new()),
                max_coroutines,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Engine bound to the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    pub fn max_coroutines(&self) -> Option<usize> {
        self.inner.max_coroutines
    }

    /// Number of coroutines whose bookkeeping has not been reclaimed yet.
    pub fn live_count(&self) -> usize {
        self.inner.live().len()
    }

    /// Refuses all further `create` calls. Running coroutines are unaffected.
    pub fn shutdown(&self) {
        if !self.inner.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!(target: "cofacade::engine", "engine shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn register(&self, parent: CoroutineId) -> Result<CoroutineId, EngineError> {
        let mut live = self.inner.live();
        if let Some(limit) = self.inner.max_coroutines
            && live.len() >= limit
        {
            return Err(EngineError::LimitReached { limit });
        }
        let id = CoroutineId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        live.insert(id, parent);
        Ok(id)
    }
}

impl Engine for TokioEngine {
    fn current_id(&self) -> CoroutineId {
        frame::current(self.inner.owner)
            .map(|frame| frame.id)
            .unwrap_or(CoroutineId::NONE)
    }

    fn create(&self, work: BoxFuture<'static, ()>) -> Result<CoroutineId, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        let parent = frame::current(self.inner.owner)
            .map(|frame| frame.id)
            .unwrap_or(CoroutineId::ROOT);
        let id = self.register(parent)?;
        let reclaim = Reclaim {
            inner: Arc::clone(&self.inner),
            id,
        };

        let started = Arc::new(AtomicBool::new(false));
        let started_flag = Arc::clone(&started);
        let body = async move {
            started_flag.store(true, Ordering::Release);
            let _reclaim = reclaim;
            let outcome = AssertUnwindSafe(work).catch_unwind().await;
            frame::run_deferred();
            if let Err(payload) = outcome {
                tracing::warn!(
                    target: "cofacade::engine",
                    coroutine = %id,
                    "coroutine panicked: {}",
                    panic_message(&*payload)
                );
            }
        };
        self.inner
            .handle
            .spawn(frame::scope(Frame::new(self.inner.owner, id, parent), body));

        // A runtime that has shut down drops the task inside `spawn`, which
        // reclaims the id before the body was ever polled.
        if !started.load(Ordering::Acquire) && !self.inner.live().contains_key(&id) {
            tracing::debug!(target: "cofacade::engine", coroutine = %id, "runtime refused coroutine");
            return Err(EngineError::ShutDown);
        }

        tracing::trace!(target: "cofacade::engine", coroutine = %id, parent = %parent, "coroutine created");
        Ok(id)
    }

    fn defer(&self, action: DeferredAction) -> Result<(), EngineError> {
        frame::push_deferred(self.inner.owner, action).map_err(|_| EngineError::NotInCoroutine)
    }

    fn parent_id(&self, id: Option<CoroutineId>) -> Result<CoroutineId, EngineError> {
        // ROOT never names a coroutine; treat it like "no id given".
        match id.filter(|id| *id != CoroutineId::ROOT) {
            None => frame::current(self.inner.owner)
                .map(|frame| frame.parent)
                .ok_or(EngineError::NotInCoroutine),
            Some(id) => self
                .inner
                .live()
                .get(&id)
                .copied()
                .ok_or(EngineError::Destroyed(id)),
        }
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
