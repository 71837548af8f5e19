//! Helpers for turning panic payloads into log-friendly text.

use std::any::Any;

/// Renders a `catch_unwind` payload. `panic!` with a literal produces a
/// `&str`, formatted panics produce a `String`; anything else is opaque.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
