//! Coroutine facade for cofacade.
//!
//! [`CoroutineFacade`] is a small, error-safe surface over an
//! [`Engine`](cofacade_engine::Engine). Work handed to it never unwinds into
//! the engine: failures are caught at the boundary and reported through an
//! optional [`Logger`].

pub mod boundary;
pub mod config;
pub mod facade;
pub mod failure;

pub use cofacade_engine::CoroutineId;
pub use cofacade_engine::EngineError as CoroutineError;
pub use config::Config;
pub use config::WatcherConfig;
pub use facade::CoroutineFacade;
pub use facade::sleep_duration;
pub use failure::FailureReporter;
pub use failure::Logger;
pub use failure::WorkFailure;
