//! Scripted fakes for the collaborators a coordination session talks to. Each fake can share a
//! [Journal] with the others so tests can assert on the interleaving of calls.

use coordinated_activity_core::{
    diagnostics::{Component, EventKind},
    ActivityIdentity, ActivityService, ActivityTask, CoordinatedActivityHandler, DiagnosticEvent,
    DiagnosticSink, RecordHeartbeatResponse, TaskToken, TaskUpdateSignaler, TickStatus,
};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::time::Instant;
use tonic::Status;

pub const TEST_ACTIVITY_TYPE: &str = "test-activity";

/// Build a task with the given token and a fixed identity
pub fn test_task(task_token: impl Into<TaskToken>) -> ActivityTask<()> {
    ActivityTask::new(
        task_token,
        ActivityIdentity::new("wf-1", TEST_ACTIVITY_TYPE, "act-1"),
        (),
    )
}

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Heartbeat(TaskToken),
    Start,
    Tick,
    Cancel,
    SignalStart(Option<String>),
    SignalUpdate(String),
}

/// Append-only log shared between fakes
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn push(&self, entry: Entry) {
        self.0.lock().push(entry)
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().clone()
    }

    /// Position of the first entry matching `pred`
    pub fn position(&self, pred: impl Fn(&Entry) -> bool) -> Option<usize> {
        self.0.lock().iter().position(pred)
    }

    /// Position of the last entry matching `pred`
    pub fn last_position(&self, pred: impl Fn(&Entry) -> bool) -> Option<usize> {
        self.0.lock().iter().rposition(pred)
    }
}

type HeartbeatFn = dyn Fn(&TaskToken, usize) -> Result<RecordHeartbeatResponse, Status> + Send + Sync;

/// Liveness service whose replies are computed from the task token and the 1-based number of the
/// heartbeat for that token
pub struct FakeActivityService {
    respond: Box<HeartbeatFn>,
    calls: Mutex<Vec<(TaskToken, Instant)>>,
    journal: Journal,
}

impl FakeActivityService {
    pub fn new(
        respond: impl Fn(&TaskToken, usize) -> Result<RecordHeartbeatResponse, Status>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(vec![]),
            journal: Journal::default(),
        }
    }

    /// Every heartbeat succeeds and nothing is ever canceled
    pub fn healthy() -> Self {
        Self::new(|_, _| Ok(RecordHeartbeatResponse::default()))
    }

    /// The `n`th heartbeat reports that cancellation was requested
    pub fn cancel_requested_on(n: usize) -> Self {
        Self::new(move |_, i| {
            Ok(RecordHeartbeatResponse {
                cancel_requested: i == n,
            })
        })
    }

    /// The `n`th heartbeat fails because the service no longer knows the task
    pub fn task_gone_on(n: usize) -> Self {
        Self::new(move |_, i| {
            if i == n {
                Err(Status::not_found("Unknown activity"))
            } else {
                Ok(RecordHeartbeatResponse::default())
            }
        })
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_count_for(&self, task_token: &TaskToken) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(tt, _)| tt == task_token)
            .count()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait::async_trait]
impl ActivityService for FakeActivityService {
    async fn record_activity_heartbeat(
        &self,
        task_token: TaskToken,
    ) -> Result<RecordHeartbeatResponse, Status> {
        let nth = {
            let mut calls = self.calls.lock();
            calls.push((task_token.clone(), Instant::now()));
            calls.iter().filter(|(tt, _)| tt == &task_token).count()
        };
        self.journal.push(Entry::Heartbeat(task_token.clone()));
        (self.respond)(&task_token, nth)
    }
}

/// What a scripted handler's fallback tick gets to decide on
#[derive(Debug, Clone, Copy)]
pub struct TickCtx {
    /// 1-based number of this tick
    pub n: usize,
    /// Time since `start` was called
    pub since_start: Duration,
}

pub type TickResult = anyhow::Result<TickStatus<String, String>>;
type TickFn = dyn Fn(TickCtx) -> TickResult + Send + Sync;

/// Handler that replays a fixed list of tick results, then falls back to a closure (by default
/// continuing forever without progress)
pub struct ScriptedHandler {
    start_result: Mutex<Option<anyhow::Result<Option<String>>>>,
    script: Mutex<VecDeque<TickResult>>,
    fallback: Box<TickFn>,
    fail_cancel: bool,
    start_delay: Duration,
    tick_delay: Duration,
    started_at: Mutex<Option<Instant>>,
    ticks: Mutex<Vec<Instant>>,
    tick_ends: Mutex<Vec<Instant>>,
    starts: Mutex<usize>,
    cancels: Mutex<Vec<Instant>>,
    journal: Journal,
}

impl ScriptedHandler {
    pub fn new(script: Vec<TickResult>) -> Self {
        Self {
            start_result: Mutex::new(None),
            script: Mutex::new(script.into()),
            fallback: Box::new(|_| Ok(TickStatus::Continue(None))),
            fail_cancel: false,
            start_delay: Duration::ZERO,
            tick_delay: Duration::ZERO,
            started_at: Mutex::new(None),
            ticks: Mutex::new(vec![]),
            tick_ends: Mutex::new(vec![]),
            starts: Mutex::new(0),
            cancels: Mutex::new(vec![]),
            journal: Journal::default(),
        }
    }

    /// Ticks forever without producing progress
    pub fn idle() -> Self {
        Self::new(vec![])
    }

    pub fn with_fallback(
        mut self,
        fallback: impl Fn(TickCtx) -> TickResult + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    /// What `start` returns. Defaults to `Ok(Some("started"))`.
    pub fn with_start_result(self, res: anyhow::Result<Option<String>>) -> Self {
        *self.start_result.lock() = Some(res);
        self
    }

    pub fn failing_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }

    /// `start` sleeps this long before returning
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Every tick sleeps this long before returning its result
    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn start_count(&self) -> usize {
        *self.starts.lock()
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.lock().len()
    }

    pub fn tick_times(&self) -> Vec<Instant> {
        self.ticks.lock().clone()
    }

    /// When each tick returned
    pub fn tick_end_times(&self) -> Vec<Instant> {
        self.tick_ends.lock().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.lock().len()
    }

    pub fn cancel_times(&self) -> Vec<Instant> {
        self.cancels.lock().clone()
    }
}

#[async_trait::async_trait]
impl CoordinatedActivityHandler for ScriptedHandler {
    type Input = ();
    type Update = String;
    type Output = String;

    fn activity_type(&self) -> &str {
        TEST_ACTIVITY_TYPE
    }

    async fn start(&self, _: &ActivityTask<()>) -> anyhow::Result<Option<String>> {
        *self.starts.lock() += 1;
        *self.started_at.lock() = Some(Instant::now());
        self.journal.push(Entry::Start);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        self.start_result
            .lock()
            .take()
            .unwrap_or_else(|| Ok(Some("started".to_string())))
    }

    async fn tick(&self, _: &ActivityTask<()>) -> TickResult {
        let now = Instant::now();
        let n = {
            let mut ticks = self.ticks.lock();
            ticks.push(now);
            ticks.len()
        };
        self.journal.push(Entry::Tick);
        if !self.tick_delay.is_zero() {
            tokio::time::sleep(self.tick_delay).await;
        }
        let scripted = self.script.lock().pop_front();
        let res = match scripted {
            Some(res) => res,
            None => {
                let started_at = self.started_at.lock().unwrap_or(now);
                (self.fallback)(TickCtx {
                    n,
                    since_start: now - started_at,
                })
            }
        };
        self.tick_ends.lock().push(Instant::now());
        res
    }

    async fn cancel(&self, _: &ActivityTask<()>) -> anyhow::Result<()> {
        self.cancels.lock().push(Instant::now());
        self.journal.push(Entry::Cancel);
        if self.fail_cancel {
            anyhow::bail!("failed to release resources");
        }
        Ok(())
    }
}

/// Signaler that records what it was asked to send, optionally failing
#[derive(Default)]
pub struct RecordingSignaler {
    fail_start: bool,
    fail_update_on: Option<usize>,
    started: Mutex<Vec<Option<String>>>,
    updates: Mutex<Vec<String>>,
    update_attempts: Mutex<usize>,
    journal: Journal,
}

impl RecordingSignaler {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    /// The `n`th (1-based) progress update fails
    pub fn failing_update_on(n: usize) -> Self {
        Self {
            fail_update_on: Some(n),
            ..Default::default()
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn started(&self) -> Vec<Option<String>> {
        self.started.lock().clone()
    }

    /// Updates that were delivered successfully, in order
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }

    pub fn update_attempts(&self) -> usize {
        *self.update_attempts.lock()
    }
}

#[async_trait::async_trait]
impl TaskUpdateSignaler<String> for RecordingSignaler {
    async fn signal_start(
        &self,
        _: &TaskToken,
        _: &ActivityIdentity,
        update: Option<String>,
    ) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("workflow execution already completed");
        }
        self.journal.push(Entry::SignalStart(update.clone()));
        self.started.lock().push(update);
        Ok(())
    }

    async fn signal_update(
        &self,
        _: &TaskToken,
        _: &ActivityIdentity,
        update: String,
    ) -> anyhow::Result<()> {
        let attempt = {
            let mut attempts = self.update_attempts.lock();
            *attempts += 1;
            *attempts
        };
        if self.fail_update_on == Some(attempt) {
            anyhow::bail!("workflow execution already completed");
        }
        self.journal.push(Entry::SignalUpdate(update.clone()));
        self.updates.lock().push(update);
        Ok(())
    }
}

/// Owned copy of a [DiagnosticEvent]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub component: Component,
    pub kind: EventKind,
    pub activity_id: String,
    pub error: Option<String>,
}

/// Diagnostic sink that keeps every event
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<RecordedEvent>>);

impl RecordingSink {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.0.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().iter().map(|e| e.kind).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        self.0.lock().push(RecordedEvent {
            component: event.component,
            kind: event.kind,
            activity_id: event.identity.activity_id.clone(),
            error: event.error.map(|e| e.to_string()),
        });
    }
}
