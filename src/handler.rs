use crate::task::ActivityTask;

/// What a single tick decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStatus<U, O> {
    /// Keep going. A progress result, if present, is signaled to the workflow before the next
    /// tick.
    Continue(Option<U>),
    /// The activity is done, end the session as completed with this result
    Complete(O),
}

/// Business logic of a long-running activity, driven by [crate::CoordinatedActivityAdapter].
///
/// The adapter calls `start` once, then `tick` at a bounded rate until it returns
/// [TickStatus::Complete] or an error. If the activity is canceled while running, `cancel` is
/// called exactly once instead of any further ticks. Any progress state lives in the
/// implementation; the adapter never re-invokes `start` and never re-delivers a tick.
#[async_trait::async_trait]
pub trait CoordinatedActivityHandler: Send + Sync {
    /// Activity input carried by the task
    type Input: Send + Sync + 'static;
    /// Payload of "started" and "progress" signals
    type Update: Send + 'static;
    /// Final result of a completed activity
    type Output: Send + 'static;

    /// Registered activity type name this handler serves
    fn activity_type(&self) -> &str;

    /// One-time setup. The returned value is passed along with the "activity started" signal.
    /// An error fails the session before any heartbeat is sent.
    async fn start(&self, task: &ActivityTask<Self::Input>) -> anyhow::Result<Option<Self::Update>>;

    /// Check progress. Return [TickStatus::Continue] to keep going; any `Err` ends the session
    /// as failed, there is no way to report an error and keep ticking.
    ///
    /// A tick is never interrupted. A cancellation that arrives while it runs is acted on once it
    /// returned.
    async fn tick(
        &self,
        task: &ActivityTask<Self::Input>,
    ) -> anyhow::Result<TickStatus<Self::Update, Self::Output>>;

    /// Release whatever `start` acquired. Errors are reported but never change the outcome.
    async fn cancel(&self, task: &ActivityTask<Self::Input>) -> anyhow::Result<()>;
}
