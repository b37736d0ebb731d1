//! Bisection session engine.
//!
//! A [`SearchSession`] tracks one user's binary search for the first frame at which the launch
//! has happened. The [`SessionRegistry`] maps each user to at most one live session. Nothing in
//! here performs I/O; callers fetch frames and collect answers, then feed them back in.

mod error;
mod registry;
mod search;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use search::{Progress, SearchSession};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the person answering probes. Used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
