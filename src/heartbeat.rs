use crate::{
    abstractions::take_cell::TakeCell,
    diagnostics::{EventKind, Reporter},
    errors::CancelCause,
    service::{is_task_gone, ActivityService, RecordHeartbeatResponse},
    task_token::TaskToken,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// Sends liveness heartbeats for one activity task at a fixed cadence until stopped, and turns
/// the two terminal conditions it can observe (cancellation requested, task gone) into a single
/// [CancelCause] on its output channel. After emitting it stops by itself, so at most one cause
/// is ever sent and no heartbeat follows it.
///
/// Dropping the monitor releases its stop signal, so a session that is torn down on any path
/// leaves no heartbeating task behind.
pub(crate) struct HeartbeatMonitor {
    stop: CancellationToken,
    join_handle: TakeCell<JoinHandle<()>>,
}

struct HeartbeatLoop {
    task_token: TaskToken,
    interval: Duration,
    max_consecutive_failures: Option<u32>,
    service: Arc<dyn ActivityService>,
    reporter: Reporter,
    stop: CancellationToken,
    cancels_tx: Sender<CancelCause>,
}

impl HeartbeatMonitor {
    /// Spawns the heartbeating task. The first heartbeat is sent one `interval` from now. Returns
    /// the monitor along with the receiving half of its cancellation channel.
    pub(crate) fn start(
        task_token: TaskToken,
        interval: Duration,
        max_consecutive_failures: Option<u32>,
        service: Arc<dyn ActivityService>,
        reporter: Reporter,
    ) -> (Self, Receiver<CancelCause>) {
        // Only ever written once, so a single slot means sending never waits
        let (cancels_tx, cancels_rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let hb_loop = HeartbeatLoop {
            task_token,
            interval,
            max_consecutive_failures,
            service,
            reporter,
            stop: stop.clone(),
            cancels_tx,
        };
        let join_handle = tokio::spawn(hb_loop.run());
        (
            Self {
                stop,
                join_handle: TakeCell::new(join_handle),
            },
            cancels_rx,
        )
    }

    /// Tells the monitor to stop and waits until its task has exited. Nothing is emitted on the
    /// cancellation channel after this is called.
    pub(crate) async fn stop(&self) {
        self.stop.cancel();
        if let Some(h) = self.join_handle.take_once() {
            if let Err(e) = h.await {
                if !e.is_cancelled() {
                    error!("Unexpected error joining heartbeat monitor: {:?}", e)
                }
            }
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl HeartbeatLoop {
    async fn run(self) {
        let mut heartbeats = interval_at(Instant::now() + self.interval, self.interval);
        heartbeats.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => return,
                _ = heartbeats.tick() => (),
            }

            let res = tokio::select! {
                biased;

                _ = self.stop.cancelled() => return,
                r = self.service.record_activity_heartbeat(self.task_token.clone()) => r,
            };

            let cause = match res {
                Ok(RecordHeartbeatResponse { cancel_requested }) => {
                    consecutive_failures = 0;
                    self.reporter.event(EventKind::HeartbeatRecorded);
                    if cancel_requested {
                        self.reporter.event(EventKind::CancelRequested);
                        Some(CancelCause::Requested)
                    } else {
                        None
                    }
                }
                Err(s) if is_task_gone(&s) => {
                    self.reporter.error(EventKind::ActivityGone, &s);
                    Some(CancelCause::TaskGone)
                }
                Err(s) => {
                    consecutive_failures += 1;
                    self.reporter.error(EventKind::HeartbeatError, &s);
                    match self.max_consecutive_failures {
                        Some(max) if consecutive_failures >= max => {
                            self.reporter.error(EventKind::HeartbeatLost, &s);
                            Some(CancelCause::HeartbeatLost {
                                failures: consecutive_failures,
                            })
                        }
                        _ => None,
                    }
                }
            };

            if let Some(cause) = cause {
                // The receiver only goes away once the session is over, at which point nobody
                // cares about the cause anymore.
                let _ = self.cancels_tx.try_send(cause);
                return;
            }
        }
    }
}
