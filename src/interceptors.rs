//! Hooks a dispatch loop can run around a coordination session. Nothing in the coordinator calls
//! these itself; wrap the session future with [intercept] to have them invoked.

use crate::{
    errors::{ActivityFailure, CancelCause},
    outcome::TerminationOutcome,
    task::ActivityTask,
};
use std::future::Future;

/// Observes an activity task at the key points of its lifecycle. Every method defaults to a
/// no-op, so implementors only override what they care about.
pub trait ActivityInterceptor<I, O>: Send + Sync {
    /// Called before the session begins
    fn before_task(&self, _task: &ActivityTask<I>) {}
    /// Called after the session completed with `result`
    fn after_task_complete(&self, _task: &ActivityTask<I>, _result: &O) {}
    /// Called after the session failed
    fn after_task_failed(&self, _task: &ActivityTask<I>, _err: &ActivityFailure) {}
    /// Called after the session was canceled
    fn after_task_canceled(&self, _task: &ActivityTask<I>, _cause: &CancelCause) {}
}

/// An interceptor that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterceptor;

impl<I, O> ActivityInterceptor<I, O> for NoopInterceptor {}

type TaskFn<I> = Box<dyn Fn(&ActivityTask<I>) + Send + Sync>;
type TaskWithFn<I, T> = Box<dyn Fn(&ActivityTask<I>, &T) + Send + Sync>;

/// An [ActivityInterceptor] assembled from closures. Any unset hook is a no-op.
pub struct FuncInterceptor<I, O> {
    pub before_task_fn: Option<TaskFn<I>>,
    pub after_task_complete_fn: Option<TaskWithFn<I, O>>,
    pub after_task_failed_fn: Option<TaskWithFn<I, ActivityFailure>>,
    pub after_task_canceled_fn: Option<TaskWithFn<I, CancelCause>>,
}

impl<I, O> Default for FuncInterceptor<I, O> {
    fn default() -> Self {
        Self {
            before_task_fn: None,
            after_task_complete_fn: None,
            after_task_failed_fn: None,
            after_task_canceled_fn: None,
        }
    }
}

impl<I, O> FuncInterceptor<I, O> {
    pub fn before_task(mut self, f: impl Fn(&ActivityTask<I>) + Send + Sync + 'static) -> Self {
        self.before_task_fn = Some(Box::new(f));
        self
    }

    pub fn after_task_complete(
        mut self,
        f: impl Fn(&ActivityTask<I>, &O) + Send + Sync + 'static,
    ) -> Self {
        self.after_task_complete_fn = Some(Box::new(f));
        self
    }

    pub fn after_task_failed(
        mut self,
        f: impl Fn(&ActivityTask<I>, &ActivityFailure) + Send + Sync + 'static,
    ) -> Self {
        self.after_task_failed_fn = Some(Box::new(f));
        self
    }

    pub fn after_task_canceled(
        mut self,
        f: impl Fn(&ActivityTask<I>, &CancelCause) + Send + Sync + 'static,
    ) -> Self {
        self.after_task_canceled_fn = Some(Box::new(f));
        self
    }
}

impl<I, O> ActivityInterceptor<I, O> for FuncInterceptor<I, O> {
    fn before_task(&self, task: &ActivityTask<I>) {
        if let Some(f) = &self.before_task_fn {
            f(task)
        }
    }

    fn after_task_complete(&self, task: &ActivityTask<I>, result: &O) {
        if let Some(f) = &self.after_task_complete_fn {
            f(task, result)
        }
    }

    fn after_task_failed(&self, task: &ActivityTask<I>, err: &ActivityFailure) {
        if let Some(f) = &self.after_task_failed_fn {
            f(task, err)
        }
    }

    fn after_task_canceled(&self, task: &ActivityTask<I>, cause: &CancelCause) {
        if let Some(f) = &self.after_task_canceled_fn {
            f(task, cause)
        }
    }
}

/// Runs `session` between the interceptor's `before_task` and the `after_*` hook matching its
/// outcome, then hands the outcome back unchanged.
pub async fn intercept<I, O, A, F>(
    interceptor: &A,
    task: &ActivityTask<I>,
    session: F,
) -> TerminationOutcome<O>
where
    A: ActivityInterceptor<I, O> + ?Sized,
    F: Future<Output = TerminationOutcome<O>>,
{
    interceptor.before_task(task);
    let outcome = session.await;
    match &outcome {
        TerminationOutcome::Completed(result) => interceptor.after_task_complete(task, result),
        TerminationOutcome::Failed(err) => interceptor.after_task_failed(task, err),
        TerminationOutcome::Canceled(cause) => interceptor.after_task_canceled(task, cause),
    }
    outcome
}
