use crate::task_token::TaskToken;
use std::fmt::{Display, Formatter};

/// Names one dispatched activity. Only ever used for correlating diagnostics, never for service
/// calls (those use the [TaskToken]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityIdentity {
    /// Id of the workflow execution that scheduled the activity
    pub workflow_id: String,
    /// Registered type name of the activity
    pub activity_type: String,
    /// Id of the activity within its workflow
    pub activity_id: String,
}

impl ActivityIdentity {
    pub fn new(
        workflow_id: impl Into<String>,
        activity_type: impl Into<String>,
        activity_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            activity_type: activity_type.into(),
            activity_id: activity_id.into(),
        }
    }
}

impl Display for ActivityIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.workflow_id, self.activity_type, self.activity_id
        )
    }
}

/// A claimed activity task as handed over by the dispatch loop. The coordinator owns it for the
/// whole session and never mutates it.
#[derive(Debug, Clone)]
pub struct ActivityTask<I> {
    pub task_token: TaskToken,
    pub identity: ActivityIdentity,
    pub input: I,
}

impl<I> ActivityTask<I> {
    pub fn new(task_token: impl Into<TaskToken>, identity: ActivityIdentity, input: I) -> Self {
        Self {
            task_token: task_token.into(),
            identity,
            input,
        }
    }
}
