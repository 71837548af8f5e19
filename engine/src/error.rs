//! Errors surfaced by an [`Engine`](crate::Engine).

use crate::id::CoroutineId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A context-dependent call was made with no enclosing coroutine.
    #[error("not running inside a coroutine")]
    NotInCoroutine,
    /// The referenced coroutine has terminated and its bookkeeping is gone.
    #[error("coroutine {0} has been destroyed")]
    Destroyed(CoroutineId),
    #[error("coroutine limit of {limit} reached")]
    LimitReached { limit: usize },
    #[error("engine has been shut down")]
    ShutDown,
}

impl EngineError {
    pub fn is_not_in_coroutine(&self) -> bool {
        matches!(self, Self::NotInCoroutine)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed(_))
    }
}
