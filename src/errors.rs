//! Error types surfaced in a session's [crate::TerminationOutcome]

/// Why a session ended in [crate::TerminationOutcome::Failed]
#[derive(thiserror::Error, Debug, displaydoc::Display)]
pub enum ActivityFailure {
    /// Activity start handler failed: {0:#}
    Start(#[source] anyhow::Error),
    /// Signaling activity start to the workflow failed: {0:#}
    SignalStart(#[source] anyhow::Error),
    /// Activity tick reported failure: {0:#}
    Tick(#[source] anyhow::Error),
}

/// Why a session ended in [crate::TerminationOutcome::Canceled]. Every variant routes through the
/// same cancellation path, so the handler's cancel hook has run by the time one is observed.
#[derive(thiserror::Error, Debug, displaydoc::Display)]
pub enum CancelCause {
    /// Cancellation of the activity task was requested by the service
    Requested,
    /// The service no longer recognizes the activity task
    TaskGone,
    /// Signaling activity progress to the workflow failed: {0:#}
    UpdateSignalFailed(#[source] anyhow::Error),
    /// Heartbeats failed {failures} times in a row, the task is considered lost
    HeartbeatLost {
        /// Consecutive heartbeat failures observed
        failures: u32,
    },
    /// The session outlived its configured maximum lifetime
    SessionExpired,
}

impl CancelCause {
    /// The error that caused the cancellation, if any. A task that simply disappeared from the
    /// service carries no error.
    pub fn error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CancelCause::TaskGone => None,
            CancelCause::UpdateSignalFailed(e) => Some(&**e),
            other => Some(other),
        }
    }
}
