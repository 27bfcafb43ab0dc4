//! Message routing
//!
//! Routes stream events to guest sessions and keeps the stream alive across
//! transient faults.

mod dispatcher;
mod supervisor;

pub use dispatcher::{MessageRouter, RouteOutcome};
pub use supervisor::{RetryPolicy, StreamSupervisor};
