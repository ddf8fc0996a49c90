use crate::{task::ActivityIdentity, task_token::TaskToken};

/// Notifies the workflow about the activity's lifecycle. Provided by the surrounding worker,
/// usually by signaling the workflow execution named in `identity`.
#[async_trait::async_trait]
pub trait TaskUpdateSignaler<U: Send + 'static>: Send + Sync {
    /// Called once, after the handler started and before its first tick, with whatever `start`
    /// returned
    async fn signal_start(
        &self,
        task_token: &TaskToken,
        identity: &ActivityIdentity,
        update: Option<U>,
    ) -> anyhow::Result<()>;

    /// Called for every progress result a tick produced, serially and in production order
    async fn signal_update(
        &self,
        task_token: &TaskToken,
        identity: &ActivityIdentity,
        update: U,
    ) -> anyhow::Result<()>;
}
