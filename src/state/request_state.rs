//! Request state definitions for tracking fetch progress
//!
//! Every request walks the same four states, in order, exactly once.

use std::fmt;

/// Represents the current state of a request in a fetch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Request has been built but no admission slot has been granted
    Queued,

    /// An admission slot is held but the fetch has not been started yet
    Admitted,

    /// The fetch task is running
    InFlight,

    /// The result has been observed and dispatched
    Completed,
}

impl RequestState {
    /// Returns the only state this one may advance to
    ///
    /// `Completed` is terminal and has no successor.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Queued => Some(Self::Admitted),
            Self::Admitted => Some(Self::InFlight),
            Self::InFlight => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Returns true if moving from this state to `next` is allowed
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.successor() == Some(next)
    }

    /// Short lowercase name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Admitted => "admitted",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
