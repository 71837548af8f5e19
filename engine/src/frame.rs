//! Per-coroutine state carried in a tokio task-local.

use crate::DeferredAction;
use crate::id::CoroutineId;
use crate::panic::panic_message;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;

tokio::task_local! {
    static FRAME: Frame;
}

pub(crate) struct Frame {
    /// Token of the engine that created this coroutine.
    owner: usize,
    id: CoroutineId,
    parent: CoroutineId,
    deferred: RefCell<Vec<DeferredAction>>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameInfo {
    pub(crate) id: CoroutineId,
    pub(crate) parent: CoroutineId,
}

impl Frame {
    pub(crate) fn new(owner: usize, id: CoroutineId, parent: CoroutineId) -> Self {
        Self {
            owner,
            id,
            parent,
            deferred: RefCell::new(Vec::new()),
        }
    }
}

pub(crate) fn scope<F: Future>(frame: Frame, fut: F) -> impl Future<Output = F::Output> {
    FRAME.scope(frame, fut)
}

/// Frame of the running coroutine, if it belongs to engine `owner`.
pub(crate) fn current(owner: usize) -> Option<FrameInfo> {
    FRAME
        .try_with(|frame| {
            (frame.owner == owner).then_some(FrameInfo {
                id: frame.id,
                parent: frame.parent,
            })
        })
        .ok()
        .flatten()
}

/// Queues `action` on the running coroutine. Hands the action back when
/// there is no coroutine of engine `owner` to attach it to.
pub(crate) fn push_deferred(owner: usize, action: DeferredAction) -> Result<(), DeferredAction> {
    let mut action = Some(action);
    let _ = FRAME.try_with(|frame| {
        if frame.owner == owner
            && let Some(action) = action.take()
        {
            frame.deferred.borrow_mut().push(action);
        }
    });
    match action {
        Some(action) => Err(action),
        None => Ok(()),
    }
}

/// Drains and runs the deferred queue of the running coroutine, newest
/// first. Actions queued while draining run in a later pass. Each action is
/// isolated so a panic never skips the rest.
pub(crate) fn run_deferred() {
    loop {
        let batch = FRAME
            .try_with(|frame| std::mem::take(&mut *frame.deferred.borrow_mut()))
            .unwrap_or_default();
        if batch.is_empty() {
            return;
        }
        for action in batch.into_iter().rev() {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(action)) {
                tracing::warn!(
                    target: "cofacade::engine",
                    "deferred action panicked: {}",
                    panic_message(&*payload)
                );
            }
        }
    }
}
