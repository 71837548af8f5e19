//! Coroutine engine contract for cofacade.
//!
//! This crate defines the narrow [`Engine`] interface the coroutine facade
//! calls through, together with [`TokioEngine`], a binding of that interface
//! onto a tokio runtime. tokio stays the scheduler; the binding only adds
//! coroutine identity, parent bookkeeping and per-coroutine deferred actions.

pub mod error;
mod frame;
pub mod id;
pub mod panic;
pub mod runtime;

use futures::future::BoxFuture;
use std::time::Duration;

pub use error::EngineError;
pub use id::CoroutineId;
pub use runtime::TokioEngine;

/// Cleanup work registered on a coroutine and run when it unwinds.
pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// The coroutine runtime the facade delegates to.
pub trait Engine: Send + Sync + 'static {
    /// Id of the coroutine currently executing, or [`CoroutineId::NONE`].
    fn current_id(&self) -> CoroutineId;

    /// Schedules `work` as a new coroutine and returns its id without
    /// waiting for it to start.
    fn create(&self, work: BoxFuture<'static, ()>) -> Result<CoroutineId, EngineError>;

    /// Registers `action` on the current coroutine.
    fn defer(&self, action: DeferredAction) -> Result<(), EngineError>;

    /// Parent of `id`, or of the current coroutine when `id` is `None`.
    fn parent_id(&self, id: Option<CoroutineId>) -> Result<CoroutineId, EngineError>;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}
