//! Indexed table of requests and their lifecycle states
//!
//! The table is owned by the task tracker; every state change goes through
//! [`RequestTable::advance`], which rejects anything but the next state in
//! the lifecycle.

use crate::crawler::Request;
use crate::state::RequestState;
use crate::SpiderError;

/// Arena of requests keyed by sequence index
#[derive(Debug)]
pub struct RequestTable {
    requests: Vec<Request>,
    states: Vec<RequestState>,
    counts: [usize; 4],
}

impl RequestTable {
    /// Builds a table from URLs, assigning indices in input order
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests: Vec<Request> = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Request::new(index, url))
            .collect();
        let states = vec![RequestState::Queued; requests.len()];
        let mut counts = [0; 4];
        counts[slot(RequestState::Queued)] = requests.len();

        Self {
            requests,
            states,
            counts,
        }
    }

    /// Number of requests in the table
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns whether the table holds no requests
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Gets a request by index
    pub fn get(&self, index: usize) -> Option<&Request> {
        self.requests.get(index)
    }

    /// Gets the current state of a request
    pub fn state(&self, index: usize) -> Option<RequestState> {
        self.states.get(index).copied()
    }

    /// Number of requests currently in `state`
    pub fn count(&self, state: RequestState) -> usize {
        self.counts[slot(state)]
    }

    /// Number of requests that have reached `Completed`
    pub fn completed(&self) -> usize {
        self.count(RequestState::Completed)
    }

    /// Number of requests not yet completed
    pub fn pending(&self) -> usize {
        self.len() - self.completed()
    }

    /// Number of requests currently holding an admission slot
    pub fn in_flight(&self) -> usize {
        self.count(RequestState::Admitted) + self.count(RequestState::InFlight)
    }

    /// Returns true once every request is `Completed`
    pub fn all_completed(&self) -> bool {
        self.completed() == self.len()
    }

    /// Moves a request to `to`, which must be its immediate successor
    pub fn advance(&mut self, index: usize, to: RequestState) -> Result<(), SpiderError> {
        let from = self
            .state(index)
            .ok_or(SpiderError::UnknownRequest { index })?;

        if !from.can_transition_to(to) {
            return Err(SpiderError::InvalidTransition { index, from, to });
        }

        self.states[index] = to;
        self.counts[slot(from)] -= 1;
        self.counts[slot(to)] += 1;
        tracing::trace!(index, from = %from, to = %to, "request state change");
        Ok(())
    }
}

fn slot(state: RequestState) -> usize {
    match state {
        RequestState::Queued => 0,
        RequestState::Admitted => 1,
        RequestState::InFlight => 2,
        RequestState::Completed => 3,
    }
}
