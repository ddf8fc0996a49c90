//! Coordinates a single long-running activity task once a worker has claimed it: heartbeats to
//! the orchestration service in the background, ticks a [CoordinatedActivityHandler] at a bounded
//! rate, forwards its progress to the workflow, and reacts when the service asks for the activity
//! to be canceled or forgets about it. Every session ends in exactly one [TerminationOutcome],
//! which the dispatch loop reports back to the service.
//!
//! Polling for tasks, the transport client and completing tasks against the service are left to
//! the embedding worker, which plugs in through [ActivityService] and [TaskUpdateSignaler].

#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate tracing;

mod abstractions;
mod config;
mod coordinator;
pub mod diagnostics;
mod errors;
mod handler;
mod heartbeat;
pub mod interceptors;
mod outcome;
mod service;
mod signaler;
mod task;
mod task_token;
pub mod telemetry;

pub use config::{CoordinatorConfig, CoordinatorConfigBuilder, CoordinatorConfigBuilderError};
pub use coordinator::CoordinatedActivityAdapter;
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, TracingSink};
pub use errors::{ActivityFailure, CancelCause};
pub use handler::{CoordinatedActivityHandler, TickStatus};
pub use outcome::TerminationOutcome;
pub use service::{is_task_gone, ActivityService, RecordHeartbeatResponse};
pub use signaler::TaskUpdateSignaler;
pub use task::{ActivityIdentity, ActivityTask};
pub use task_token::{fmt_tt, TaskToken};
