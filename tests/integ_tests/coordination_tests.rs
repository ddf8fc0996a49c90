use super::{default_harness, harness, HB, TICK};
use anyhow::anyhow;
use coordinated_activity_core::{
    diagnostics::{Component, EventKind},
    ActivityFailure, CancelCause, CoordinatorConfig, TerminationOutcome, TickStatus,
};
use rstest::rstest;
use std::{sync::Arc, time::Duration};
use test_utils::{
    test_task, Entry, FakeActivityService, Journal, RecordingSignaler, RecordingSink,
    ScriptedHandler,
};
use tokio::time::Instant;

fn progress(s: &str) -> anyhow::Result<TickStatus<String, String>> {
    Ok(TickStatus::Continue(Some(s.to_string())))
}

fn complete(s: &str) -> anyhow::Result<TickStatus<String, String>> {
    Ok(TickStatus::Complete(s.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum Ending {
    TickComplete,
    TickFail,
    CancelRequested,
    ResourceGone,
}

#[rstest]
#[case::tick_complete(Ending::TickComplete)]
#[case::tick_fail(Ending::TickFail)]
#[case::cancel_requested(Ending::CancelRequested)]
#[case::resource_gone(Ending::ResourceGone)]
#[tokio::test(start_paused = true)]
async fn heartbeat_stops_on_every_termination_path(#[case] ending: Ending) {
    // Tick driven endings happen on the 6th tick, heartbeat driven ones on the 2nd heartbeat.
    // An idle handler never ends the session by itself.
    let handler = match ending {
        Ending::TickComplete => ScriptedHandler::idle().with_fallback(|ctx| {
            if ctx.n >= 6 {
                complete("done")
            } else {
                Ok(TickStatus::Continue(None))
            }
        }),
        Ending::TickFail => ScriptedHandler::idle().with_fallback(|ctx| {
            if ctx.n >= 6 {
                Err(anyhow!("tick blew up"))
            } else {
                Ok(TickStatus::Continue(None))
            }
        }),
        _ => ScriptedHandler::idle(),
    };
    let service = match ending {
        Ending::CancelRequested => FakeActivityService::cancel_requested_on(2),
        Ending::ResourceGone => FakeActivityService::task_gone_on(2),
        _ => FakeActivityService::healthy(),
    };
    let h = default_harness(handler, service, RecordingSignaler::default());

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    match ending {
        Ending::TickComplete => assert_matches!(outcome, TerminationOutcome::Completed(r) if r == "done"),
        Ending::TickFail => {
            assert_matches!(outcome, TerminationOutcome::Failed(ActivityFailure::Tick(_)))
        }
        Ending::CancelRequested => {
            assert_matches!(outcome, TerminationOutcome::Canceled(CancelCause::Requested))
        }
        Ending::ResourceGone => {
            assert_matches!(outcome, TerminationOutcome::Canceled(CancelCause::TaskGone))
        }
    }
    h.assert_heartbeat_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn tick_rate_is_bounded_by_min_interval() {
    let tick_interval = Duration::from_millis(50);
    let window = Duration::from_millis(300);
    let handler = ScriptedHandler::idle().with_fallback(move |ctx| {
        if ctx.since_start >= window {
            complete("done")
        } else {
            Ok(TickStatus::Continue(None))
        }
    });
    let h = harness(
        CoordinatorConfig::new(HB, tick_interval).unwrap(),
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert!(outcome.is_completed());

    let ticks = h.handler.tick_times();
    assert!(ticks.len() >= 5, "only {} ticks", ticks.len());
    assert!(ticks.len() <= 6, "{} ticks in {:?}", ticks.len(), window);
    for pair in ticks.windows(2) {
        assert!(pair[1] - pair[0] >= tick_interval);
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_session_stops_heartbeating() {
    let tick_interval = Duration::from_millis(50);
    let handler = ScriptedHandler::idle();
    let h = harness(
        CoordinatorConfig::new(HB, tick_interval).unwrap(),
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );
    let task = test_task(vec![1]);

    // Let the session run for a while, then drop it
    let _ = tokio::time::timeout(Duration::from_millis(520), h.adapter.coordinate(&task)).await;
    let ticks = h.handler.tick_times();
    assert_eq!(ticks.len(), 10);
    for pair in ticks.windows(2) {
        assert!(pair[1] - pair[0] >= tick_interval);
    }
    h.assert_heartbeat_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn start_failure_never_ticks_cancels_or_heartbeats() {
    let handler = ScriptedHandler::idle().with_start_result(Err(anyhow!("bad input")));
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(outcome, TerminationOutcome::Failed(ActivityFailure::Start(e)) => {
        assert_eq!(e.to_string(), "bad input");
    });
    assert_eq!(h.handler.tick_count(), 0);
    assert_eq!(h.handler.cancel_count(), 0);
    assert!(h.signaler.started().is_empty());
    tokio::time::sleep(HB * 5).await;
    assert_eq!(h.service.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_signal_failure_fails_without_ticking() {
    let h = default_harness(
        ScriptedHandler::idle(),
        FakeActivityService::healthy(),
        RecordingSignaler::failing_start(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(
        outcome,
        TerminationOutcome::Failed(ActivityFailure::SignalStart(_))
    );
    assert_eq!(h.handler.start_count(), 1);
    assert_eq!(h.handler.tick_count(), 0);
    tokio::time::sleep(HB * 5).await;
    assert_eq!(h.service.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn resource_gone_on_third_heartbeat_cancels_once() {
    let h = default_harness(
        ScriptedHandler::idle(),
        FakeActivityService::task_gone_on(3),
        RecordingSignaler::default(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(outcome, TerminationOutcome::Canceled(cause) => {
        assert_matches!(cause, CancelCause::TaskGone);
        assert!(cause.error().is_none());
    });
    assert_eq!(h.handler.cancel_count(), 1);
    assert_eq!(h.service.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn progress_updates_forwarded_in_order() {
    let handler =
        ScriptedHandler::new(vec![progress("resA"), progress("resB"), complete("resC")]);
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_eq!(outcome.completed().as_deref(), Some("resC"));
    assert_eq!(h.signaler.updates(), vec!["resA", "resB"]);
    assert_eq!(h.signaler.update_attempts(), 2);
    assert_eq!(h.handler.cancel_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn ticks_without_progress_are_not_signaled() {
    let handler = ScriptedHandler::new(vec![
        Ok(TickStatus::Continue(None)),
        progress("half"),
        Ok(TickStatus::Continue(None)),
        complete("all"),
    ]);
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert!(outcome.is_completed());
    assert_eq!(h.signaler.updates(), vec!["half"]);
    assert_eq!(h.handler.tick_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn update_signal_failure_routes_through_cancel() {
    let handler = ScriptedHandler::new(vec![progress("resA"), progress("resB")]);
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::failing_update_on(1),
    );

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(
        outcome,
        TerminationOutcome::Canceled(CancelCause::UpdateSignalFailed(e)) => {
            assert_eq!(e.to_string(), "workflow execution already completed");
        }
    );
    assert_eq!(h.handler.cancel_count(), 1);
    assert_eq!(h.handler.tick_count(), 1);
    assert!(h.signaler.updates().is_empty());
    h.assert_heartbeat_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_hook_errors_are_reported_not_escalated() {
    let sink = Arc::new(RecordingSink::default());
    let h = default_harness(
        ScriptedHandler::idle().failing_cancel(),
        FakeActivityService::cancel_requested_on(1),
        RecordingSignaler::default(),
    )
    .with_diagnostics(sink.clone());

    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(outcome, TerminationOutcome::Canceled(CancelCause::Requested));
    assert_eq!(h.handler.cancel_count(), 1);
    let cancel_err = sink
        .events()
        .into_iter()
        .find(|e| e.kind == EventKind::CancelError)
        .expect("cancel error reported");
    assert_eq!(cancel_err.component, Component::Coordinator);
    assert_eq!(
        cancel_err.error.as_deref(),
        Some("failed to release resources")
    );
}

#[tokio::test(start_paused = true)]
async fn started_signal_precedes_first_tick() {
    let journal = Journal::default();
    let handler = ScriptedHandler::new(vec![progress("p"), complete("done")])
        .with_journal(journal.clone());
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default().with_journal(journal.clone()),
    );

    h.adapter.coordinate(&test_task(vec![1])).await;
    assert_eq!(
        journal.entries(),
        vec![
            Entry::Start,
            Entry::SignalStart(Some("started".to_string())),
            Entry::Tick,
            Entry::SignalUpdate("p".to_string()),
            Entry::Tick,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn lifecycle_is_reported_as_diagnostic_events() {
    let sink = Arc::new(RecordingSink::default());
    let handler = ScriptedHandler::new(vec![progress("p"), complete("done")]);
    let h = default_harness(
        handler,
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    )
    .with_diagnostics(sink.clone());

    h.adapter.coordinate(&test_task(vec![1])).await;
    assert_eq!(
        sink.kinds(),
        vec![
            EventKind::Started,
            EventKind::SignalUpdate,
            EventKind::Completed
        ]
    );
    assert!(sink.events().iter().all(|e| e.activity_id == "act-1"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_do_not_share_state() {
    let service = FakeActivityService::new(|tt, n| {
        if tt.0 == [1u8] && n == 2 {
            Ok(coordinated_activity_core::RecordHeartbeatResponse {
                cancel_requested: true,
            })
        } else if tt.0 == [2u8] && n == 4 {
            Err(tonic::Status::not_found("Unknown activity"))
        } else {
            Ok(Default::default())
        }
    });
    let h = default_harness(
        ScriptedHandler::idle(),
        service,
        RecordingSignaler::default(),
    );
    let (t1, t2) = (test_task(vec![1]), test_task(vec![2]));

    let (o1, o2) = tokio::join!(h.adapter.coordinate(&t1), h.adapter.coordinate(&t2));
    assert_matches!(o1, TerminationOutcome::Canceled(CancelCause::Requested));
    assert_matches!(o2, TerminationOutcome::Canceled(CancelCause::TaskGone));
    assert_eq!(h.handler.cancel_count(), 2);
    assert_eq!(h.service.call_count_for(&t1.task_token), 2);
    assert_eq!(h.service.call_count_for(&t2.task_token), 4);
    h.assert_heartbeat_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn session_lifetime_bound_cancels() {
    let config = coordinated_activity_core::CoordinatorConfigBuilder::default()
        .heartbeat_interval(HB)
        .tick_min_interval(TICK)
        .max_session_lifetime(Duration::from_millis(450))
        .build()
        .unwrap();
    let h = harness(
        config,
        ScriptedHandler::idle(),
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let started = Instant::now();
    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(
        outcome,
        TerminationOutcome::Canceled(CancelCause::SessionExpired)
    );
    assert!(started.elapsed() >= Duration::from_millis(450));
    assert_eq!(h.handler.cancel_count(), 1);
    h.assert_heartbeat_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn session_lifetime_counts_from_end_of_start() {
    let start_delay = Duration::from_millis(200);
    let lifetime = Duration::from_millis(450);
    let config = coordinated_activity_core::CoordinatorConfigBuilder::default()
        .heartbeat_interval(HB)
        .tick_min_interval(TICK)
        .max_session_lifetime(lifetime)
        .build()
        .unwrap();
    let h = harness(
        config,
        ScriptedHandler::idle().with_start_delay(start_delay),
        FakeActivityService::healthy(),
        RecordingSignaler::default(),
    );

    let started = Instant::now();
    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(
        outcome,
        TerminationOutcome::Canceled(CancelCause::SessionExpired)
    );
    assert!(started.elapsed() >= start_delay + lifetime);
    let first_tick = h.handler.tick_times()[0];
    assert!(first_tick >= started + start_delay + TICK);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_slow_tick_waits_for_tick_to_return() {
    let tick_delay = Duration::from_millis(250);
    let journal = Journal::default();
    let h = default_harness(
        ScriptedHandler::idle()
            .with_tick_delay(tick_delay)
            .with_journal(journal.clone()),
        FakeActivityService::cancel_requested_on(1).with_journal(journal.clone()),
        RecordingSignaler::default(),
    );

    let started = Instant::now();
    let outcome = h.adapter.coordinate(&test_task(vec![1])).await;
    assert_matches!(outcome, TerminationOutcome::Canceled(CancelCause::Requested));
    assert_eq!(h.handler.cancel_count(), 1);

    // The cancel request landed while the first tick was still running
    let heartbeat_at = h.service.call_times()[0];
    let tick_started = h.handler.tick_times()[0];
    let tick_ended = h.handler.tick_end_times()[0];
    assert!(tick_started >= started + TICK);
    assert!(tick_started < heartbeat_at && heartbeat_at < tick_ended);

    // and was only acted on after it returned, without starting another tick
    let canceled_at = h.handler.cancel_times()[0];
    assert!(tick_ended <= canceled_at);
    assert_eq!(h.handler.tick_count(), 1);
    assert_eq!(
        journal.entries(),
        vec![
            Entry::Start,
            Entry::Tick,
            Entry::Heartbeat(vec![1u8].into()),
            Entry::Cancel,
        ]
    );
    h.assert_heartbeat_stopped().await;
}
