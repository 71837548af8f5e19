//! Coroutine handle type.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Integer handle of a coroutine, as assigned by the engine.
///
/// Two values are sentinels: [`CoroutineId::NONE`] means "no coroutine
/// context" (or a failed creation), [`CoroutineId::ROOT`] is the parent of a
/// top-level coroutine. Positive values identify coroutines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoroutineId(i64);

impl CoroutineId {
    pub const NONE: Self = Self(-1);
    pub const ROOT: Self = Self(0);

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// True for ids that can name a coroutine (strictly positive).
    pub const fn is_coroutine(self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for CoroutineId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<CoroutineId> for i64 {
    fn from(id: CoroutineId) -> Self {
        id.0
    }
}

impl fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
