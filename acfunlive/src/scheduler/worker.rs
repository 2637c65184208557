//! Cycle worker.
//!
//! A worker polls its streamer's live status and starts or stops the
//! streamer's activities on transitions. It owns its mailbox receiver; the
//! sender lives in the state table and is cleared by the worker on exit.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::{ControlMessage, ControlVerb};
use crate::error::Error;
use crate::platform::StreamInfo;
use crate::services::ServiceContainer;
use crate::streamer::Streamer;

/// Polling task of one watched streamer.
pub struct CycleWorker {
    services: Arc<ServiceContainer>,
    uid: u64,
    mailbox: mpsc::UnboundedReceiver<ControlMessage>,
    cancel: CancellationToken,
    /// The live session seen by the last poll.
    live: Option<StreamInfo>,
}

impl CycleWorker {
    /// Register a worker for `streamer` and spawn it.
    ///
    /// Returns `false` without spawning when a worker is already running.
    pub fn spawn(services: &Arc<ServiceContainer>, streamer: &Streamer) -> bool {
        let uid = streamer.uid;
        let (tx, rx) = mpsc::unbounded_channel();

        let registered = services.states.upsert(uid, |state| {
            if state.has_worker() {
                false
            } else {
                state.worker = Some(tx);
                true
            }
        });
        if !registered {
            debug!(uid, "Worker already running for {}", streamer.long_id());
            return false;
        }

        let worker = Self {
            services: services.clone(),
            uid,
            mailbox: rx,
            cancel: services.cancellation_token(),
            live: None,
        };
        services.tasks.spawn(worker.run());
        true
    }

    async fn run(mut self) {
        let Some(streamer) = self.services.registry.get(self.uid) else {
            self.finish();
            return;
        };
        info!(uid = self.uid, "Watching {}", streamer.long_id());

        let mut ticker = tokio::time::interval(self.services.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(uid = self.uid, "Worker cancelled");
                    break;
                }

                msg = self.mailbox.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.handle_message(msg) {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if !self.poll().await {
                        break;
                    }
                }
            }
        }

        info!(uid = self.uid, "Stopped watching {}", streamer.long_id());
        self.finish();
    }

    /// Returns `false` when the worker should exit.
    fn handle_message(&mut self, msg: ControlMessage) -> bool {
        match msg.verb {
            ControlVerb::StopCycle | ControlVerb::Quit => {
                debug!(uid = self.uid, verb = %msg.verb, "Worker asked to exit");
                false
            }
            ControlVerb::LiveOff => {
                if self.live.take().is_some() {
                    self.stop_session_activities();
                }
                true
            }
            ControlVerb::StopRecord => {
                self.services.recorder.stop_recording(self.uid);
                true
            }
            ControlVerb::StartCycle => {
                debug!(uid = self.uid, "Worker is already running");
                true
            }
        }
    }

    /// One live-status check. Returns `false` when the worker should exit.
    async fn poll(&mut self) -> bool {
        let Some(streamer) = self.services.registry.get(self.uid) else {
            debug!(uid = self.uid, "Streamer left the roster");
            return false;
        };
        let modified = self.services.states.take_modified(self.uid);

        let stream = match self.services.client.resolve_stream(self.uid).await {
            Ok(stream) => stream,
            Err(e @ Error::StreamerNotFound { .. }) => {
                warn!(uid = self.uid, error = %e, "Giving up on {}", streamer.long_id());
                return false;
            }
            Err(e) => {
                warn!(uid = self.uid, error = %e, "Failed to check live status");
                return true;
            }
        };

        match (self.live.take(), stream.is_live()) {
            (None, true) => self.on_live_on(&streamer, &stream).await,
            (Some(previous), true) if !previous.same_session(&stream) => {
                info!(uid = self.uid, "{} started a new live session", streamer.long_id());
                self.on_live_off(&streamer).await;
                self.on_live_on(&streamer, &stream).await;
            }
            (Some(_), true) if modified => self.apply_changes(&streamer, &stream),
            (Some(_), false) => self.on_live_off(&streamer).await,
            _ => {}
        }

        if stream.is_live() {
            self.live = Some(stream);
        }
        true
    }

    async fn on_live_on(&self, streamer: &Streamer, stream: &StreamInfo) {
        info!(uid = self.uid, title = %stream.title, "{} is live", streamer.long_id());

        if streamer.notify.notify_on {
            let message = format!("{} is live: {}", streamer.name, stream.title);
            self.services.notifier.desktop(&message).await;
            self.services.notifier.qq(streamer, &message).await;
        }
        if streamer.record {
            self.services.recorder.start_for(streamer, stream);
        }
        if streamer.danmu {
            self.services.danmu.start_for(streamer, stream);
        }
    }

    async fn on_live_off(&self, streamer: &Streamer) {
        info!(uid = self.uid, "{} went offline", streamer.long_id());

        if streamer.notify.notify_on {
            let message = format!("{} has gone offline", streamer.name);
            self.services.notifier.desktop(&message).await;
            self.services.notifier.qq(streamer, &message).await;
        }
        self.stop_session_activities();
    }

    /// Stop the recording and danmu capture tied to the ended session.
    fn stop_session_activities(&self) {
        self.services.states.update(self.uid, |state| {
            if let Some(recording) = &state.recording {
                recording.request_stop();
            }
            if let Some(danmu) = &state.danmu {
                danmu.cancel();
            }
        });
    }

    /// Start activities that were enabled while the streamer was live.
    fn apply_changes(&self, streamer: &Streamer, stream: &StreamInfo) {
        let Some(state) = self.services.states.get(self.uid) else {
            return;
        };
        debug!(uid = self.uid, "Applying changed settings");
        if streamer.record && !state.is_recording() {
            self.services.recorder.start_for(streamer, stream);
        }
        if streamer.danmu && !state.is_capturing_danmu() {
            self.services.danmu.start_for(streamer, stream);
        }
    }

    fn finish(&mut self) {
        self.mailbox.close();
        self.services.states.update(self.uid, |state| {
            if state.worker.as_ref().is_some_and(|w| w.is_closed()) {
                state.worker = None;
            }
        });
        self.services
            .states
            .try_delete(self.uid, &self.services.registry);
    }
}
