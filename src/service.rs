use crate::task_token::TaskToken;
use tonic::{Code, Status};

/// What the service replied to a heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordHeartbeatResponse {
    /// Set when the workflow asked for the activity to be canceled
    pub cancel_requested: bool,
}

/// The liveness call the heartbeat monitor makes against the orchestration service. Implemented
/// by the transport client the dispatch loop already owns.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ActivityService: Send + Sync {
    /// Report activity task heartbeat. `task_token` identifies the task as received from the
    /// dispatch loop. The response's `cancel_requested` flag, if set, indicates that the activity
    /// has been cancelled.
    async fn record_activity_heartbeat(
        &self,
        task_token: TaskToken,
    ) -> Result<RecordHeartbeatResponse, Status>;
}

/// True if the error means the service no longer knows about the task (it completed, timed out,
/// or its workflow already finished). Such an error is terminal for heartbeating, every other
/// error is treated as transient.
pub fn is_task_gone(status: &Status) -> bool {
    status.code() == Code::NotFound
}
