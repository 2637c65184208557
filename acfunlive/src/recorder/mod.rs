//! Video recording.
//!
//! Each recording runs an external capture process supervised by its own
//! task. The task owns the process's standard input; everything else talks
//! to it through the [`RecordingHandle`] stored in the state table.

mod handle;
mod process;

pub use handle::{QUIT_BYTE, RecordingHandle, RecordingInfo, RecordingSignals};
pub use process::{FfmpegLauncher, ProcessLauncher, SpawnedCapture};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::StreamSource;
use crate::control::ControlVerb;
use crate::error::{Error, Result};
use crate::notification::Notifier;
use crate::platform::{LiveClient, StreamInfo};
use crate::state::{DanglingRecordings, StateTable};
use crate::streamer::{Streamer, StreamerRegistry};
use crate::utils::capture_base_name;
use crate::utils::filename::capture_path;

/// Pause before restarting an interrupted recording.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Shared dependencies of the recorder.
pub struct RecorderContext {
    pub client: Arc<dyn LiveClient>,
    pub registry: Arc<StreamerRegistry>,
    pub states: Arc<StateTable>,
    pub dangling: Arc<DanglingRecordings>,
    pub notifier: Arc<dyn Notifier>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub tasks: TaskTracker,
    pub root: CancellationToken,
}

/// How a single capture process ended.
enum ProcessEnd {
    /// A stop was requested or the application is shutting down.
    Stopped,
    /// The process exited on its own.
    Exited,
}

/// Starts, stops and supervises recordings.
pub struct Recorder {
    ctx: RecorderContext,
    source: StreamSource,
    output_dir: PathBuf,
    restart_delay: Duration,
    next_id: AtomicU64,
}

impl Recorder {
    pub fn new(ctx: RecorderContext, source: StreamSource, output_dir: PathBuf) -> Self {
        Self {
            ctx,
            source,
            output_dir,
            restart_delay: DEFAULT_RESTART_DELAY,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Start recording `uid` on request.
    ///
    /// A `temporary` recording does not need the streamer to be registered
    /// and always announces its start and end. Otherwise the registered
    /// streamer's settings are used.
    pub async fn start_recording(self: &Arc<Self>, uid: u64, temporary: bool) -> Result<JoinHandle<()>> {
        let streamer = match self.ctx.registry.get(uid) {
            Some(streamer) if !temporary => streamer,
            registered => {
                let name = match registered {
                    Some(streamer) => streamer.name,
                    None if temporary => self
                        .ctx
                        .client
                        .user_name(uid)
                        .await?
                        .ok_or_else(|| Error::not_found(uid))?,
                    None => return Err(Error::not_found(uid)),
                };
                let mut streamer = Streamer::new(uid, name);
                streamer.notify.notify_record = true;
                streamer
            }
        };

        let stream = self.ctx.client.resolve_stream(uid).await?;
        if !stream.is_live() {
            return Err(Error::not_live(uid));
        }

        self.spawn(streamer, stream, temporary)
            .ok_or_else(|| Error::Recording(format!("{uid} is already being recorded")))
    }

    /// Start recording a streamer that was just seen going live.
    pub fn start_for(self: &Arc<Self>, streamer: &Streamer, stream: &StreamInfo) -> bool {
        self.spawn(streamer.clone(), stream.clone(), false).is_some()
    }

    /// Ask the recording of `uid` to stop. Returns `false` when none is running.
    pub fn stop_recording(&self, uid: u64) -> bool {
        let handle = self.ctx.states.get(uid).and_then(|state| state.recording);
        match handle {
            Some(handle) => {
                info!(uid, "Stopping recording of {}", handle.info.name);
                handle.request_stop();
                true
            }
            None => {
                warn!(uid, "No recording is running");
                false
            }
        }
    }

    /// Move the recording of `uid` out of the state table into the dangling
    /// set. Used when the streamer is removed from the roster mid-capture.
    pub fn detach_recording(&self, uid: u64) -> bool {
        let dangling = &self.ctx.dangling;
        let detached = self
            .ctx
            .states
            .update(uid, |state| match state.recording.take() {
                Some(handle) => {
                    dangling.insert(handle);
                    true
                }
                None => false,
            })
            .unwrap_or(false);

        if detached {
            info!(uid, "Recording detached from removed streamer");
            self.ctx.states.try_delete(uid, &self.ctx.registry);
        }
        detached
    }

    fn source_url<'a>(&self, stream: &'a StreamInfo) -> &'a str {
        match self.source {
            StreamSource::Flv => &stream.flv_url,
            StreamSource::Hls => &stream.hls_url,
        }
    }

    fn spawn(self: &Arc<Self>, streamer: Streamer, stream: StreamInfo, temporary: bool) -> Option<JoinHandle<()>> {
        let uid = streamer.uid;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = RecordingInfo {
            name: streamer.name.clone(),
            title: stream.title.clone(),
            url: self.source_url(&stream).to_string(),
            path: PathBuf::new(),
            started_at: Utc::now(),
            temporary,
        };
        let (handle, signals) = RecordingHandle::new(id, uid, info);

        // A recording that was asked to stop may still be flushing its file;
        // it no longer owns the slot.
        let registered = self.ctx.states.upsert(uid, |state| match &state.recording {
            Some(existing) if !existing.is_stopping() => false,
            _ => {
                state.recording = Some(handle);
                true
            }
        });
        if !registered {
            warn!(uid, "Already recording {}", streamer.long_id());
            return None;
        }

        let this = Arc::clone(self);
        Some(self.ctx.tasks.spawn(async move {
            this.run(streamer, stream, id, signals).await;
        }))
    }

    async fn run(&self, streamer: Streamer, stream: StreamInfo, id: u64, mut signals: RecordingSignals) {
        let _cleanup = RecordingCleanup {
            states: &self.ctx.states,
            dangling: &self.ctx.dangling,
            registry: &self.ctx.registry,
            uid: streamer.uid,
            id,
        };

        let notify = streamer.notify.notify_record;
        if notify {
            self.ctx
                .notifier
                .desktop(&format!("Started recording {}", streamer.name))
                .await;
        }

        if let Err(e) = self.supervise(&streamer, stream, id, &mut signals).await {
            error!(
                uid = streamer.uid,
                error = %e,
                "Recording of {} failed, run `startrecord {}` to restart it",
                streamer.long_id(),
                streamer.uid
            );
            self.ctx
                .notifier
                .desktop(&format!("Recording of {} failed", streamer.name))
                .await;
            return;
        }

        info!(uid = streamer.uid, "Recording of {} finished", streamer.long_id());
        if notify {
            self.ctx
                .notifier
                .desktop(&format!("Recording of {} finished", streamer.name))
                .await;
        }
    }

    /// Run capture processes until a stop is requested or the session ends.
    async fn supervise(
        &self,
        streamer: &Streamer,
        session: StreamInfo,
        id: u64,
        signals: &mut RecordingSignals,
    ) -> Result<()> {
        let uid = streamer.uid;
        let mut stream = session.clone();

        loop {
            let base_name = capture_base_name(&streamer.name, &stream.title);
            let path = capture_path(&self.output_dir, &base_name, "mp4").ok_or_else(|| {
                Error::Recording(format!("No usable file name for {base_name}"))
            })?;
            let url = self.source_url(&stream).to_string();
            self.ctx.states.update(uid, |state| {
                if let Some(handle) = state.recording.as_mut().filter(|h| h.id == id) {
                    handle.info.path = path.clone();
                    handle.info.url = url.clone();
                }
            });

            info!(uid, path = %path.display(), "Recording {}", streamer.long_id());
            let capture = self.ctx.launcher.launch(&url, &path)?;
            match self.drive(capture, signals).await? {
                ProcessEnd::Stopped => return Ok(()),
                ProcessEnd::Exited => {}
            }

            if self.ctx.root.is_cancelled() || self.ctx.dangling.contains(id) {
                return Ok(());
            }

            if self.stopped_during_delay(signals).await || self.ctx.dangling.contains(id) {
                debug!(uid, "Recording stopped before it could restart");
                return Ok(());
            }

            let latest = self.ctx.client.resolve_stream(uid).await?;
            if !session.same_session(&latest) {
                debug!(uid, "Live session ended, not restarting the recording");
                return Ok(());
            }
            warn!(uid, "Recording of {} ended unexpectedly, restarting", streamer.long_id());
            stream = latest;
        }
    }

    /// Sleep out the restart delay. Returns `true` when a stop request or
    /// shutdown arrives first.
    async fn stopped_during_delay(&self, signals: &mut RecordingSignals) -> bool {
        let delay = tokio::time::sleep(self.restart_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                biased;

                Some(verb) = signals.control.recv() => match verb {
                    ControlVerb::StopRecord | ControlVerb::Quit => return true,
                    ControlVerb::StartCycle | ControlVerb::StopCycle | ControlVerb::LiveOff => {
                        debug!(%verb, "Ignoring control verb");
                    }
                },
                _ = self.ctx.root.cancelled() => return true,
                _ = &mut delay => return false,
            }
        }
    }

    /// Forward signals to one capture process until it exits.
    async fn drive(&self, capture: SpawnedCapture, signals: &mut RecordingSignals) -> Result<ProcessEnd> {
        let SpawnedCapture { mut stdin, exited } = capture;
        tokio::pin!(exited);
        let mut stopping = false;

        loop {
            // Control verbs are queued before the quit byte, so polling them
            // first marks the stop before the process can exit on it.
            tokio::select! {
                biased;

                Some(verb) = signals.control.recv() => match verb {
                    ControlVerb::StopRecord | ControlVerb::Quit => stopping = true,
                    ControlVerb::StartCycle | ControlVerb::StopCycle | ControlVerb::LiveOff => {
                        debug!(%verb, "Ignoring control verb");
                    }
                },
                Some(bytes) = signals.stdin.recv() => {
                    write_bytes(&mut stdin, bytes).await;
                }
                status = &mut exited => {
                    match status {
                        Ok(success) => debug!(success, "Capture process exited"),
                        Err(e) => warn!(error = %e, "Failed to wait for the capture process"),
                    }
                    return Ok(if stopping { ProcessEnd::Stopped } else { ProcessEnd::Exited });
                }
                _ = self.ctx.root.cancelled(), if !stopping => {
                    stopping = true;
                }
            }
        }
    }
}

async fn write_bytes(stdin: &mut (impl AsyncWriteExt + Unpin), bytes: Bytes) {
    let result = async {
        stdin.write_all(&bytes).await?;
        stdin.flush().await
    }
    .await;
    if let Err(e) = result {
        debug!(error = %e, "Failed to write to capture process");
    }
}

/// Clears the recording's bookkeeping exactly once, on every exit path of
/// the task including unwinding.
struct RecordingCleanup<'a> {
    states: &'a StateTable,
    dangling: &'a DanglingRecordings,
    registry: &'a StreamerRegistry,
    uid: u64,
    id: u64,
}

impl Drop for RecordingCleanup<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.states.update(self.uid, |state| {
            if state.recording.as_ref().is_some_and(|h| h.id == id) {
                state.recording = None;
            }
        });
        self.dangling.remove(id);
        self.states.try_delete(self.uid, self.registry);
    }
}
