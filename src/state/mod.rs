//! State module for tracking fetch progress
//!
//! # Components
//!
//! - `RequestState`: the lifecycle of a single request (queued, admitted, in flight, completed)
//! - `RequestTable`: the indexed table of requests owned by the task tracker

mod request_state;
mod request_table;

// Re-export main types
pub use request_state::RequestState;
pub use request_table::RequestTable;
