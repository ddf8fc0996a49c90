use crate::{
    config::CoordinatorConfig,
    diagnostics::{Component, DiagnosticSink, EventKind, Reporter, TracingSink},
    errors::{ActivityFailure, CancelCause},
    handler::{CoordinatedActivityHandler, TickStatus},
    heartbeat::HeartbeatMonitor,
    outcome::TerminationOutcome,
    service::ActivityService,
    signaler::TaskUpdateSignaler,
    task::ActivityTask,
};
use std::{future, sync::Arc};
use tokio::{
    sync::mpsc::Receiver,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};

/// Drives one [CoordinatedActivityHandler] through a session per activity task: starts it,
/// heartbeats in the background, ticks it at a bounded rate, forwards its progress to the
/// workflow, and cancels it if the service asks to. Each call to [Self::coordinate] produces
/// exactly one [TerminationOutcome].
///
/// One adapter serves any number of tasks of its activity type, concurrently or not. Sessions
/// never share state.
pub struct CoordinatedActivityAdapter<H: CoordinatedActivityHandler> {
    config: CoordinatorConfig,
    handler: Arc<H>,
    service: Arc<dyn ActivityService>,
    signaler: Arc<dyn TaskUpdateSignaler<H::Update>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<H: CoordinatedActivityHandler> CoordinatedActivityAdapter<H> {
    pub fn new(
        config: CoordinatorConfig,
        handler: Arc<H>,
        service: Arc<dyn ActivityService>,
        signaler: Arc<dyn TaskUpdateSignaler<H::Update>>,
    ) -> Self {
        Self {
            config,
            handler,
            service,
            signaler,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Route diagnostic events somewhere other than `tracing`
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// The activity type this adapter should be registered under
    pub fn activity_type(&self) -> &str {
        self.handler.activity_type()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run a full session for `task`. Resolves once the session reached its terminal outcome
    /// and its heartbeat monitor has exited.
    ///
    /// Dropping the returned future before it resolves also stops heartbeating, but skips the
    /// handler's cancel hook.
    pub async fn coordinate(&self, task: &ActivityTask<H::Input>) -> TerminationOutcome<H::Output> {
        let reporter = Reporter::new(
            Component::Coordinator,
            task.identity.clone(),
            task.task_token.clone(),
            self.diagnostics.clone(),
        );
        let outcome = self.run_session(task, &reporter).await;
        match &outcome {
            TerminationOutcome::Completed(_) => reporter.event(EventKind::Completed),
            TerminationOutcome::Failed(e) => reporter.error(EventKind::Failed, e),
            TerminationOutcome::Canceled(cause) => {
                reporter.emit(EventKind::Canceled, cause.error())
            }
        }
        outcome
    }

    async fn run_session(
        &self,
        task: &ActivityTask<H::Input>,
        reporter: &Reporter,
    ) -> TerminationOutcome<H::Output> {
        let update = match self.handler.start(task).await {
            Ok(u) => u,
            Err(e) => return TerminationOutcome::Failed(ActivityFailure::Start(e)),
        };
        if let Err(e) = self
            .signaler
            .signal_start(&task.task_token, &task.identity, update)
            .await
        {
            return TerminationOutcome::Failed(ActivityFailure::SignalStart(e));
        }
        reporter.event(EventKind::Started);

        let (monitor, cancels) = HeartbeatMonitor::start(
            task.task_token.clone(),
            self.config.heartbeat_interval,
            self.config.max_consecutive_heartbeat_failures,
            self.service.clone(),
            reporter.for_component(Component::HeartbeatMonitor),
        );
        let outcome = self.tick_loop(task, reporter, cancels).await;
        monitor.stop().await;
        outcome
    }

    async fn tick_loop(
        &self,
        task: &ActivityTask<H::Input>,
        reporter: &Reporter,
        mut cancels: Receiver<CancelCause>,
    ) -> TerminationOutcome<H::Output> {
        let tick_interval = self.config.tick_min_interval;
        let mut ticks = interval_at(Instant::now() + tick_interval, tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let max_lifetime = self.config.max_session_lifetime;
        let lifetime = async move {
            match max_lifetime {
                Some(d) => sleep(d).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(lifetime);

        let mut monitor_alive = true;
        // Cancellations the loop raises itself are parked here and picked up on the next
        // iteration, so every cancellation leaves through the same exit below.
        let mut pending_cancel: Option<CancelCause> = None;

        let cause = loop {
            if let Some(cause) = pending_cancel.take() {
                break cause;
            }
            // Pending cancellations win over a tick that became ready while the last one ran.
            tokio::select! {
                biased;

                maybe_cause = cancels.recv(), if monitor_alive => match maybe_cause {
                    Some(cause) => break cause,
                    None => {
                        // The monitor only exits on its own after emitting, so this means it
                        // died. Keep ticking without liveness rather than spin on the channel.
                        error!(task_token = %task.task_token,
                               "Heartbeat monitor exited without emitting a cancellation");
                        monitor_alive = false;
                    }
                },
                _ = &mut lifetime => {
                    reporter.event(EventKind::SessionExpired);
                    break CancelCause::SessionExpired;
                },
                _ = ticks.tick() => {
                    // Ticks run to completion, a cancellation arriving meanwhile is only seen on
                    // the next iteration.
                    match self.handler.tick(task).await {
                        Err(e) => return TerminationOutcome::Failed(ActivityFailure::Tick(e)),
                        Ok(TickStatus::Complete(result)) => {
                            return TerminationOutcome::Completed(result)
                        }
                        Ok(TickStatus::Continue(None)) => (),
                        Ok(TickStatus::Continue(Some(update))) => {
                            match self
                                .signaler
                                .signal_update(&task.task_token, &task.identity, update)
                                .await
                            {
                                Ok(()) => reporter.event(EventKind::SignalUpdate),
                                Err(e) => {
                                    reporter.error(EventKind::SignalUpdateError, &*e);
                                    pending_cancel = Some(CancelCause::UpdateSignalFailed(e));
                                }
                            }
                        }
                    }
                }
            }
        };

        if let Err(e) = self.handler.cancel(task).await {
            reporter.error(EventKind::CancelError, &*e);
        }
        TerminationOutcome::Canceled(cause)
    }
}
