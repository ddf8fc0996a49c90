//! Structured diagnostic events. The coordinator and the heartbeat monitor never log directly,
//! they describe what happened as a [DiagnosticEvent] and hand it to a [DiagnosticSink], so the
//! embedding worker decides where those end up. [TracingSink] is the default.

use crate::{task::ActivityIdentity, task_token::TaskToken};
use std::{error::Error, sync::Arc};

/// Which part of a session produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Component {
    #[display(fmt = "heartbeat-monitor")]
    HeartbeatMonitor,
    #[display(fmt = "coordinator")]
    Coordinator,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EventKind {
    #[display(fmt = "heartbeat-recorded")]
    HeartbeatRecorded,
    #[display(fmt = "heartbeat-error")]
    HeartbeatError,
    #[display(fmt = "heartbeat-lost")]
    HeartbeatLost,
    #[display(fmt = "activity-gone")]
    ActivityGone,
    #[display(fmt = "activity-cancel-requested")]
    CancelRequested,
    #[display(fmt = "activity-started")]
    Started,
    #[display(fmt = "signal-update")]
    SignalUpdate,
    #[display(fmt = "signal-update-error")]
    SignalUpdateError,
    #[display(fmt = "activity-cancel-err")]
    CancelError,
    #[display(fmt = "session-expired")]
    SessionExpired,
    #[display(fmt = "activity-completed")]
    Completed,
    #[display(fmt = "activity-failed")]
    Failed,
    #[display(fmt = "activity-canceled")]
    Canceled,
}

/// A single diagnostic event, borrowed from the session that produced it
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticEvent<'a> {
    pub component: Component,
    pub identity: &'a ActivityIdentity,
    pub task_token: &'a TaskToken,
    pub kind: EventKind,
    pub error: Option<&'a (dyn Error + 'static)>,
}

/// Receives every diagnostic event of every session. Called inline from the session, so it
/// should not block.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &DiagnosticEvent<'_>);
}

/// Routes events into `tracing` with the task identity as structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

macro_rules! trace_event {
    ($lvl:ident, $ev:expr) => {
        $lvl!(
            component = %$ev.component,
            workflow_id = %$ev.identity.workflow_id,
            activity_type = %$ev.identity.activity_type,
            activity_id = %$ev.identity.activity_id,
            task_token = %$ev.task_token,
            error = $ev.error.map(tracing::field::display),
            "{}",
            $ev.kind
        )
    };
}

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        match event.kind {
            EventKind::HeartbeatRecorded | EventKind::SignalUpdate => trace_event!(debug, event),
            EventKind::Started
            | EventKind::CancelRequested
            | EventKind::ActivityGone
            | EventKind::Completed
            | EventKind::Canceled => trace_event!(info, event),
            EventKind::HeartbeatError
            | EventKind::HeartbeatLost
            | EventKind::SignalUpdateError
            | EventKind::CancelError
            | EventKind::SessionExpired
            | EventKind::Failed => trace_event!(warn, event),
        }
    }
}

/// Binds one session's identity to a sink so call sites only name the event
pub(crate) struct Reporter {
    component: Component,
    identity: ActivityIdentity,
    task_token: TaskToken,
    sink: Arc<dyn DiagnosticSink>,
}

impl Reporter {
    pub(crate) fn new(
        component: Component,
        identity: ActivityIdentity,
        task_token: TaskToken,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            component,
            identity,
            task_token,
            sink,
        }
    }

    /// The same session, reported as a different component
    pub(crate) fn for_component(&self, component: Component) -> Self {
        Self {
            component,
            identity: self.identity.clone(),
            task_token: self.task_token.clone(),
            sink: self.sink.clone(),
        }
    }

    pub(crate) fn event(&self, kind: EventKind) {
        self.emit(kind, None)
    }

    pub(crate) fn error(&self, kind: EventKind, error: &(dyn Error + 'static)) {
        self.emit(kind, Some(error))
    }

    pub(crate) fn emit(&self, kind: EventKind, error: Option<&(dyn Error + 'static)>) {
        self.sink.emit(&DiagnosticEvent {
            component: self.component,
            identity: &self.identity,
            task_token: &self.task_token,
            kind,
            error,
        });
    }
}
