//! Danmu capture supervisor.
//!
//! Each capture runs in its own task, registered in the state table through
//! a [`DanmuHandle`] holding a child of the root cancellation token. A capture
//! that loses its feed while the broadcaster is still in the same live
//! session reconnects and keeps appending to the same file.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::feed::write_subtitle_file;
use crate::error::{Error, Result};
use crate::notification::Notifier;
use crate::platform::{LiveClient, StreamInfo};
use crate::state::StateTable;
use crate::streamer::{Streamer, StreamerRegistry};
use crate::utils::capture_base_name;
use crate::utils::filename::capture_path;

/// Pause before reconnecting an interrupted feed.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Details of a running capture.
#[derive(Debug, Clone, Default)]
pub struct DanmuInfo {
    pub name: String,
    pub title: String,
    /// Subtitle file, known once the capture has resolved its output path.
    pub path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

/// State-table entry of a running capture.
#[derive(Debug, Clone)]
pub struct DanmuHandle {
    /// Distinguishes this capture from a later one for the same streamer.
    pub id: u64,
    token: CancellationToken,
    pub info: DanmuInfo,
}

impl DanmuHandle {
    pub fn new(id: u64, token: CancellationToken, info: DanmuInfo) -> Self {
        Self { id, token, info }
    }

    /// Ask the capture to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Starts, stops and supervises danmu captures.
pub struct DanmuSupervisor {
    client: Arc<dyn LiveClient>,
    registry: Arc<StreamerRegistry>,
    states: Arc<StateTable>,
    notifier: Arc<dyn Notifier>,
    output_dir: PathBuf,
    tasks: TaskTracker,
    root: CancellationToken,
    reconnect_delay: Duration,
    next_id: AtomicU64,
}

impl DanmuSupervisor {
    pub fn new(
        client: Arc<dyn LiveClient>,
        registry: Arc<StreamerRegistry>,
        states: Arc<StateTable>,
        notifier: Arc<dyn Notifier>,
        output_dir: PathBuf,
        tasks: TaskTracker,
        root: CancellationToken,
    ) -> Self {
        Self {
            client,
            registry,
            states,
            notifier,
            output_dir,
            tasks,
            root,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Start a one-off capture for `uid`.
    ///
    /// Fails when the user does not exist, is not live, or already has a
    /// capture running. The returned handle resolves when the capture ends.
    pub async fn start_danmu(self: &Arc<Self>, uid: u64) -> Result<JoinHandle<()>> {
        let name = match self.registry.name(uid) {
            Some(name) => name,
            None => self
                .client
                .user_name(uid)
                .await?
                .ok_or_else(|| Error::not_found(uid))?,
        };

        let mut streamer = Streamer::new(uid, name);
        streamer.notify.notify_danmu = true;

        let stream = self.client.resolve_stream(uid).await?;
        if !stream.is_live() {
            return Err(Error::not_live(uid));
        }

        self.spawn(streamer, stream.title).ok_or_else(|| {
            Error::Danmu(format!("danmu of {uid} is already being captured"))
        })
    }

    /// Start a capture for a streamer that was just seen going live.
    pub fn start_for(self: &Arc<Self>, streamer: &Streamer, stream: &StreamInfo) -> bool {
        self.spawn(streamer.clone(), stream.title.clone()).is_some()
    }

    /// Cancel the running capture of `uid`. Returns `false` when there is none.
    pub fn stop_danmu(&self, uid: u64) -> bool {
        let stopped = self
            .states
            .update(uid, |state| match &state.danmu {
                Some(handle) => {
                    handle.cancel();
                    true
                }
                None => false,
            })
            .unwrap_or(false);

        if stopped {
            info!(uid, "Stopping danmu capture");
        } else {
            warn!(uid, "No danmu capture is running");
        }
        stopped
    }

    /// Register a capture for `streamer` and spawn its task. The subtitle
    /// file is named `<timestamp> <name> <title>.ass`.
    ///
    /// Returns `None` without spawning when a capture is already registered.
    pub fn spawn(self: &Arc<Self>, streamer: Streamer, title: String) -> Option<JoinHandle<()>> {
        let uid = streamer.uid;
        let base_name = capture_base_name(&streamer.name, &title);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let info = DanmuInfo {
            name: streamer.name.clone(),
            title,
            path: None,
            started_at: Utc::now(),
        };

        // A cancelled capture is already winding down and no longer owns the
        // slot; its cleanup only clears its own id.
        let registered = self.states.upsert(uid, |state| match &state.danmu {
            Some(existing) if !existing.is_cancelled() => false,
            _ => {
                state.danmu = Some(DanmuHandle::new(id, token.clone(), info));
                true
            }
        });
        if !registered {
            warn!(uid, "Danmu capture already running for {}", streamer.long_id());
            return None;
        }

        let this = Arc::clone(self);
        Some(self.tasks.spawn(async move {
            this.run(streamer, base_name, id, token).await;
        }))
    }

    /// Task body. Errors end the capture here and never reach the caller.
    async fn run(&self, streamer: Streamer, base_name: String, id: u64, token: CancellationToken) {
        let _cleanup = CaptureCleanup {
            states: &self.states,
            registry: &self.registry,
            uid: streamer.uid,
            id,
        };

        if let Err(e) = self.capture(&streamer, &base_name, id, &token).await {
            error!(
                uid = streamer.uid,
                error = %e,
                "Danmu capture of {} failed, run `startdanmu {}` to restart it",
                streamer.long_id(),
                streamer.uid
            );
            self.notifier
                .desktop(&format!(
                    "Danmu capture of {} failed, run `startdanmu {}` to restart it",
                    streamer.name, streamer.uid
                ))
                .await;
        }
    }

    async fn capture(
        &self,
        streamer: &Streamer,
        base_name: &str,
        id: u64,
        token: &CancellationToken,
    ) -> Result<()> {
        let uid = streamer.uid;
        let session = self.client.resolve_stream(uid).await?;
        if !session.is_live() {
            error!(
                uid,
                "Cannot resolve the stream of {}, run `startdanmu {}` to retry",
                streamer.long_id(),
                uid
            );
            self.notifier
                .desktop(&format!(
                    "Cannot resolve the stream of {}, danmu capture ended",
                    streamer.name
                ))
                .await;
            return Ok(());
        }

        let Some(path) = capture_path(&self.output_dir, base_name, "ass") else {
            warn!(uid, base_name, "No usable subtitle file name");
            return Ok(());
        };
        self.states.update(uid, |state| {
            if let Some(handle) = state.danmu.as_mut().filter(|h| h.id == id) {
                handle.info.path = Some(path.clone());
            }
        });

        let notify = announces_danmu(streamer);
        let mut config = session.subtitle.clone();
        config.title = base_name.to_string();
        config.start_time = Utc::now();

        let mut started = false;
        loop {
            let mut feed = match self.client.open_danmu_feed(uid, token).await {
                Ok(feed) => feed,
                Err(_) if token.is_cancelled() => break,
                Err(e) => return Err(e),
            };
            if !started {
                info!(uid, path = %path.display(), "Started danmu capture of {}", streamer.long_id());
                if notify {
                    self.notifier
                        .desktop(&format!("Started capturing danmu of {}", streamer.name))
                        .await;
                }
            }

            let written = write_subtitle_file(feed.as_mut(), token, &config, &path, !started).await?;
            debug!(uid, written, "Danmu feed returned");
            started = true;

            if token.is_cancelled() {
                break;
            }

            match self.client.resolve_stream(uid).await {
                Ok(latest) if session.same_session(&latest) => {
                    warn!(
                        uid,
                        "Danmu capture of {} ended unexpectedly, reconnecting",
                        streamer.long_id()
                    );
                }
                Ok(_) => break,
                Err(e) => {
                    warn!(uid, error = %e, "Cannot check the live session, ending danmu capture");
                    break;
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        info!(uid, "Danmu capture of {} finished", streamer.long_id());
        if notify && started {
            self.notifier
                .desktop(&format!("Danmu capture of {} finished", streamer.name))
                .await;
        }
        Ok(())
    }
}

/// Captures that run alongside a recording are announced by the recorder.
fn announces_danmu(streamer: &Streamer) -> bool {
    streamer.notify.notify_danmu && !streamer.record
}

/// Clears the capture's state-table entry exactly once, on every exit path
/// of the task including unwinding.
struct CaptureCleanup<'a> {
    states: &'a StateTable,
    registry: &'a StreamerRegistry,
    uid: u64,
    id: u64,
}

impl Drop for CaptureCleanup<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.states.update(self.uid, |state| {
            if state.danmu.as_ref().is_some_and(|h| h.id == id) {
                state.danmu = None;
            }
        });
        self.states.try_delete(self.uid, self.registry);
    }
}
