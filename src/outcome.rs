use crate::errors::{ActivityFailure, CancelCause};

/// The single final result of a coordination session. The dispatch loop reports it to the
/// orchestration service; the coordinator itself never closes tasks.
#[derive(Debug)]
pub enum TerminationOutcome<O> {
    /// A tick reported the activity done
    Completed(O),
    /// Start, the started signal, or a tick failed
    Failed(ActivityFailure),
    /// The session was canceled and the handler's cancel hook has run
    Canceled(CancelCause),
}

impl<O> TerminationOutcome<O> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TerminationOutcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TerminationOutcome::Failed(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, TerminationOutcome::Canceled(_))
    }

    /// The completed result, if there is one
    pub fn completed(self) -> Option<O> {
        match self {
            TerminationOutcome::Completed(o) => Some(o),
            _ => None,
        }
    }
}
