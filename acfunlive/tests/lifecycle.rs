//! Capture lifecycle and shutdown behaviour against fake collaborators.

mod common;

use std::time::Duration;

use acfunlive::control::{ControlMessage, ControlVerb};
use acfunlive::scheduler::{CycleWorker, Dispatcher, sync_roster};
use acfunlive::shutdown::ShutdownCoordinator;
use acfunlive::streamer::{Intent, IntentOutcome, StreamerRegistry, add_intent};
use common::{FakeClient, Harness, streamer, wait_until};

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_danmu_reconnects_within_same_session() {
    let alice = streamer(1, "Alice", false, true);
    let h = Harness::new(vec![alice.clone()]);
    h.client.set_live(1, "session-1", "Morning");

    let stream = h.services.client.resolve_stream(1).await.unwrap();
    assert!(h.services.danmu.start_for(&alice, &stream));

    // The fake feed ends right away; the capture must reopen it.
    assert!(wait_until(WAIT, || h.client.feed_opens() >= 2).await);
    assert!(h.services.states.get(1).unwrap().is_capturing_danmu());

    h.client.set_offline(1);
    let states = h.services.states.clone();
    assert!(
        wait_until(WAIT, || states.get(1).is_none_or(|s| !s.is_capturing_danmu())).await
    );

    assert_eq!(h.notifier.desktop_count("Started capturing danmu of Alice"), 1);
    assert_eq!(h.notifier.desktop_count("Danmu capture of Alice finished"), 1);

    let subtitles: Vec<_> = std::fs::read_dir(h.dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "ass"))
        .collect();
    assert_eq!(subtitles.len(), 1);
    let content = std::fs::read_to_string(subtitles[0].path()).unwrap();
    assert!(content.contains("[Script Info]"));
    assert!(content.contains("hello"));
}

#[tokio::test]
async fn test_quit_signals_every_activity_once() {
    let mut h = Harness::new(vec![
        streamer(1, "Alice", true, true),
        streamer(2, "Bob", true, true),
    ]);
    h.client.hold_feeds(true);
    h.client.set_live(1, "a-1", "Alice live");
    h.client.set_live(2, "b-1", "Bob live");

    for s in h.services.registry.list() {
        assert!(CycleWorker::spawn(&h.services, &s));
    }
    let states = h.services.states.clone();
    assert!(
        wait_until(WAIT, || {
            states.recording_uids() == vec![1, 2] && states.danmu_uids() == vec![1, 2]
        })
        .await
    );
    assert_eq!(h.notifier.qq_messages().len(), 2);

    let receiver = h.receiver.take().unwrap();
    h.services.bus.send(ControlMessage::quit()).await.unwrap();
    let report = Dispatcher::new(h.services.clone(), receiver).run().await;

    assert_eq!(report.workers_signalled, 2);
    assert_eq!(report.recordings_stopped, 2);
    assert_eq!(report.danmu_cancelled, 2);
    assert_eq!(report.dangling_stopped, 0);
    assert!(report.drained);

    assert_eq!(h.launcher.quit_bytes(), 2);
    assert!(h.services.states.recording_uids().is_empty());
    assert!(h.services.states.danmu_uids().is_empty());
    assert!(h.services.is_shutting_down());
}

#[tokio::test]
async fn test_dangling_recording_is_stopped_on_quit() {
    let eve = streamer(5, "Eve", true, false);
    let h = Harness::new(vec![eve.clone()]);
    h.client.set_live(5, "e-1", "Late show");

    let stream = h.services.client.resolve_stream(5).await.unwrap();
    assert!(h.services.recorder.start_for(&eve, &stream));
    let states = h.services.states.clone();
    assert!(wait_until(WAIT, || !h.launcher.launches().is_empty()).await);
    assert!(states.get(5).unwrap().is_recording());

    h.services.registry.delete(5).unwrap();
    assert!(h.services.recorder.detach_recording(5));
    assert_eq!(h.services.dangling.len(), 1);
    assert!(!h.services.states.contains(5));

    let report = ShutdownCoordinator::new(&h.services).run().await;
    assert_eq!(report.dangling_stopped, 1);
    assert_eq!(report.recordings_stopped, 0);
    assert!(report.drained);
    assert_eq!(h.launcher.quit_bytes(), 1);
    assert!(h.services.dangling.is_empty());
}

#[tokio::test]
async fn test_worker_stops_captures_when_stream_ends() {
    let h = Harness::new(vec![streamer(3, "Carol", true, true)]);
    h.client.hold_feeds(true);
    h.client.set_live(3, "c-1", "Carol live");

    let carol = h.services.registry.get(3).unwrap();
    assert!(CycleWorker::spawn(&h.services, &carol));
    assert!(!CycleWorker::spawn(&h.services, &carol));

    let states = h.services.states.clone();
    assert!(
        wait_until(WAIT, || {
            states
                .get(3)
                .is_some_and(|s| s.is_recording() && s.is_capturing_danmu())
        })
        .await
    );

    h.client.set_offline(3);
    assert!(
        wait_until(WAIT, || {
            states
                .get(3)
                .is_some_and(|s| !s.is_recording() && !s.is_capturing_danmu())
        })
        .await
    );
    assert_eq!(h.launcher.quit_bytes(), 1);
    assert_eq!(h.notifier.desktop_count("Carol is live"), 1);
    assert_eq!(h.notifier.desktop_count("Carol has gone offline"), 1);
    assert_eq!(h.notifier.desktop_count("Recording of Carol finished"), 1);
    assert!(states.get(3).unwrap().has_worker());

    ShutdownCoordinator::new(&h.services).run().await;
}

#[tokio::test]
async fn test_concurrent_add_intent_enables_once() {
    let registry = StreamerRegistry::in_memory();
    let client = FakeClient::default();
    client.set_name(9, "Dave");

    let attempts = (0..8).map(|_| add_intent(&registry, &client, 9, Intent::Record));
    let outcomes = futures::future::join_all(attempts).await;

    let enabled = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(IntentOutcome::Enabled)))
        .count();
    assert_eq!(enabled, 1);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert!(registry.get(9).unwrap().record);
}

#[tokio::test]
async fn test_roster_sync_applies_added_and_removed_streamers() {
    let alice = streamer(1, "Alice", true, false);
    let mut h = Harness::new(vec![alice.clone()]);
    h.client.set_live(1, "a-1", "Alice live");
    let stream = h.services.client.resolve_stream(1).await.unwrap();
    assert!(h.services.recorder.start_for(&alice, &stream));

    h.services.registry.set(streamer(2, "Bob", false, true)).unwrap();
    h.services.registry.delete(1).unwrap();
    let diff = sync_roster(&h.services).await.unwrap();
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.removed.len(), 1);
    assert!(diff.changed.is_empty());

    let msg = h.receiver.as_mut().unwrap().recv().await.unwrap();
    assert_eq!(msg.verb, ControlVerb::StartCycle);
    assert_eq!(msg.uid(), 2);
    assert_eq!(h.services.dangling.len(), 1);
    assert!(!h.services.states.contains(1));

    h.services
        .registry
        .modify(2, false, |s| s.record = true)
        .unwrap();
    let diff = sync_roster(&h.services).await.unwrap();
    assert_eq!(diff.changed.len(), 1);
    assert!(sync_roster(&h.services).await.unwrap().is_empty());

    let report = ShutdownCoordinator::new(&h.services).run().await;
    assert_eq!(report.dangling_stopped, 1);
    assert!(report.drained);
}

#[tokio::test]
async fn test_stop_during_restart_delay_prevents_relaunch() {
    let h = Harness::new(Vec::new());
    h.client.set_name(5, "Eve");
    h.client.set_live(5, "e-1", "Late show");
    h.launcher.crash_next(1);

    let eve = streamer(5, "Eve", true, false);
    let stream = h.services.client.resolve_stream(5).await.unwrap();
    assert!(h.services.recorder.start_for(&eve, &stream));
    assert!(wait_until(WAIT, || h.launcher.launches().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(h.services.recorder.stop_recording(5));
    let states = h.services.states.clone();
    // Well within the restart delay.
    assert!(wait_until(Duration::from_secs(2), || !states.contains(5)).await);
    assert_eq!(h.launcher.launches().len(), 1);
    assert_eq!(h.notifier.desktop_count("Recording of Eve finished"), 1);
}

#[tokio::test]
async fn test_refused_danmu_feed_ends_capture() {
    let h = Harness::new(Vec::new());
    h.client.set_name(9, "Judy");
    h.client.set_live(9, "j-1", "Judy live");
    h.client.refuse_feeds(true);

    let handle = h.services.danmu.start_danmu(9).await.unwrap();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();

    assert_eq!(h.client.feed_opens(), 1);
    assert_eq!(h.client.resolves(), 2);
    assert_eq!(h.notifier.desktop_count("Started capturing danmu"), 0);
    assert_eq!(h.notifier.desktop_count("run `startdanmu 9` to restart it"), 1);
    assert!(!h.services.states.contains(9));
    let files = std::fs::read_dir(h.dir.path()).unwrap().count();
    assert_eq!(files, 0);
}

#[tokio::test]
async fn test_danmu_ends_when_session_changes() {
    let alice = streamer(1, "Alice", false, true);
    let h = Harness::new(vec![alice.clone()]);
    h.client.set_live(1, "session-1", "Morning");

    let stream = h.services.client.resolve_stream(1).await.unwrap();
    assert!(h.services.danmu.start_for(&alice, &stream));
    assert!(wait_until(WAIT, || h.client.feed_opens() >= 2).await);

    h.client.set_live(1, "session-2", "Evening");
    let states = h.services.states.clone();
    assert!(
        wait_until(WAIT, || states.get(1).is_none_or(|s| !s.is_capturing_danmu())).await
    );
    let opens = h.client.feed_opens();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.client.feed_opens(), opens);

    assert_eq!(h.notifier.desktop_count("Started capturing danmu of Alice"), 1);
    assert_eq!(h.notifier.desktop_count("Danmu capture of Alice finished"), 1);
}

#[tokio::test]
async fn test_danmu_write_failure_notifies_and_cleans_up() {
    let h = Harness::with_config(Vec::new(), |config, dir| {
        config.output = dir.join("missing").to_string_lossy().into_owned();
    });
    h.client.set_name(4, "Kim");
    h.client.set_live(4, "k-1", "Kim live");

    let handle = h.services.danmu.start_danmu(4).await.unwrap();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();

    assert_eq!(h.notifier.desktop_count("Danmu capture of Kim failed"), 1);
    assert_eq!(h.notifier.desktop_count("Danmu capture of Kim finished"), 0);
    assert!(!h.services.states.contains(4));
    assert!(!h.dir.path().join("missing").exists());
}

#[tokio::test]
async fn test_dispatcher_routes_streamer_verbs() {
    let mut h = Harness::with_config(vec![streamer(3, "Carol", true, true)], |config, _| {
        config.poll_interval_secs = 3600;
    });
    h.client.hold_feeds(true);
    h.client.set_live(3, "c-1", "Carol live");
    let carol = h.services.registry.get(3).unwrap();

    let receiver = h.receiver.take().unwrap();
    let dispatcher = tokio::spawn(Dispatcher::new(h.services.clone(), receiver).run());
    let bus = h.services.bus.clone();
    let states = h.services.states.clone();

    bus.send(ControlMessage::start_cycle(carol.clone())).await.unwrap();
    assert!(
        wait_until(WAIT, || {
            states
                .get(3)
                .is_some_and(|s| s.is_recording() && s.is_capturing_danmu())
        })
        .await
    );

    bus.send(ControlMessage::new(carol.clone(), ControlVerb::LiveOff))
        .await
        .unwrap();
    assert!(
        wait_until(WAIT, || {
            states
                .get(3)
                .is_some_and(|s| !s.is_recording() && !s.is_capturing_danmu())
        })
        .await
    );
    assert!(states.get(3).unwrap().has_worker());
    assert_eq!(h.launcher.quit_bytes(), 1);

    bus.send(ControlMessage::stop_cycle(carol.clone())).await.unwrap();
    assert!(wait_until(WAIT, || states.get(3).is_some_and(|s| !s.has_worker())).await);

    h.services.recorder.start_recording(3, true).await.unwrap();
    assert!(wait_until(WAIT, || h.launcher.launches().len() == 2).await);
    bus.send(ControlMessage::new(carol, ControlVerb::StopRecord))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || states.get(3).is_some_and(|s| !s.is_recording())).await);
    assert_eq!(h.launcher.quit_bytes(), 2);

    bus.send(ControlMessage::quit()).await.unwrap();
    let report = tokio::time::timeout(WAIT, dispatcher).await.unwrap().unwrap();
    assert_eq!(report.workers_signalled, 0);
    assert!(report.drained);
}

#[tokio::test]
async fn test_worker_exits_for_unknown_streamer() {
    // Registered locally but unknown to the platform.
    let h = Harness::new(Vec::new());
    let ghost = streamer(13, "Ghost", true, false);
    h.services.registry.set(ghost.clone()).unwrap();

    assert!(CycleWorker::spawn(&h.services, &ghost));
    let states = h.services.states.clone();
    assert!(wait_until(WAIT, || states.get(13).is_some_and(|s| !s.has_worker())).await);
    assert!(h.launcher.launches().is_empty());
}
