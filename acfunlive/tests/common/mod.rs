//! Fakes for the external collaborators plus a container builder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use acfunlive::config::AppConfig;
use acfunlive::control::BusReceiver;
use acfunlive::danmu::{Comment, DanmuFeed};
use acfunlive::logging::LogTail;
use acfunlive::notification::{DesktopNotifier, NotificationService, Notifier};
use acfunlive::platform::{LiveClient, LiveRoom, StreamInfo};
use acfunlive::recorder::{ProcessLauncher, QUIT_BYTE, SpawnedCapture};
use acfunlive::services::{Collaborators, ServiceContainer};
use acfunlive::streamer::{Streamer, StreamerRegistry};
use acfunlive::{Error, Result};

/// Scriptable platform client.
#[derive(Default)]
pub struct FakeClient {
    streams: Mutex<HashMap<u64, StreamInfo>>,
    names: Mutex<HashMap<u64, String>>,
    /// Feeds stay open until cancelled instead of ending right away.
    hold_feeds: AtomicBool,
    /// Opening a feed fails, like a client without a danmu transport.
    refuse_feeds: AtomicBool,
    pub feed_opens: AtomicUsize,
    pub resolves: AtomicUsize,
}

impl FakeClient {
    pub fn set_name(&self, uid: u64, name: &str) {
        self.names.lock().insert(uid, name.to_string());
    }

    pub fn set_live(&self, uid: u64, session: &str, title: &str) {
        let stream = StreamInfo {
            hls_url: format!("https://hls.example/{session}.m3u8"),
            flv_url: format!("https://flv.example/{session}.flv"),
            stream_name: session.to_string(),
            title: title.to_string(),
            ..Default::default()
        };
        self.streams.lock().insert(uid, stream);
    }

    pub fn set_offline(&self, uid: u64) {
        self.streams.lock().remove(&uid);
    }

    pub fn hold_feeds(&self, hold: bool) {
        self.hold_feeds.store(hold, Ordering::SeqCst);
    }

    pub fn refuse_feeds(&self, refuse: bool) {
        self.refuse_feeds.store(refuse, Ordering::SeqCst);
    }

    pub fn feed_opens(&self) -> usize {
        self.feed_opens.load(Ordering::SeqCst)
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveClient for FakeClient {
    async fn resolve_stream(&self, uid: u64) -> Result<StreamInfo> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if !self.names.lock().contains_key(&uid) {
            return Err(Error::not_found(uid));
        }
        Ok(self.streams.lock().get(&uid).cloned().unwrap_or_default())
    }

    async fn user_name(&self, uid: u64) -> Result<Option<String>> {
        Ok(self.names.lock().get(&uid).cloned())
    }

    async fn live_rooms(&self) -> Result<Vec<LiveRoom>> {
        let names = self.names.lock();
        let rooms = self
            .streams
            .lock()
            .iter()
            .map(|(uid, stream)| LiveRoom {
                uid: *uid,
                name: names.get(uid).cloned().unwrap_or_default(),
                title: stream.title.clone(),
            })
            .collect();
        Ok(rooms)
    }

    async fn open_danmu_feed(
        &self,
        _uid: u64,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn DanmuFeed>> {
        self.feed_opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse_feeds.load(Ordering::SeqCst) {
            return Err(Error::Danmu("no transport".to_string()));
        }
        Ok(Box::new(FakeFeed {
            comments: vec![Comment::new("viewer", "hello")],
            hold: self.hold_feeds.load(Ordering::SeqCst),
        }))
    }
}

struct FakeFeed {
    comments: Vec<Comment>,
    hold: bool,
}

#[async_trait]
impl DanmuFeed for FakeFeed {
    async fn next_comment(&mut self) -> Result<Option<Comment>> {
        if let Some(comment) = self.comments.pop() {
            return Ok(Some(comment));
        }
        if self.hold {
            std::future::pending::<()>().await;
        }
        Ok(None)
    }
}

/// Records every notification.
#[derive(Default)]
pub struct FakeNotifier {
    desktop: Mutex<Vec<String>>,
    qq: Mutex<Vec<(u64, String)>>,
}

impl FakeNotifier {
    pub fn desktop_count(&self, needle: &str) -> usize {
        self.desktop
            .lock()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    pub fn qq_messages(&self) -> Vec<(u64, String)> {
        self.qq.lock().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn desktop(&self, message: &str) {
        self.desktop.lock().push(message.to_string());
    }

    async fn qq(&self, streamer: &Streamer, message: &str) {
        self.qq.lock().push((streamer.uid, message.to_string()));
    }
}

/// Capture "processes" that exit when they read the quit byte.
#[derive(Default)]
pub struct FakeLauncher {
    launches: Mutex<Vec<(String, PathBuf)>>,
    quit_bytes: Arc<AtomicUsize>,
    /// Number of upcoming processes that exit on their own right away.
    crashes: AtomicUsize,
}

impl FakeLauncher {
    pub fn launches(&self) -> Vec<(String, PathBuf)> {
        self.launches.lock().clone()
    }

    pub fn quit_bytes(&self) -> usize {
        self.quit_bytes.load(Ordering::SeqCst)
    }

    pub fn crash_next(&self, count: usize) {
        self.crashes.store(count, Ordering::SeqCst);
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, url: &str, output: &Path) -> Result<SpawnedCapture> {
        self.launches
            .lock()
            .push((url.to_string(), output.to_path_buf()));

        let (stdin, mut process) = tokio::io::duplex(64);
        let crashed = self
            .crashes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if crashed {
            return Ok(SpawnedCapture {
                stdin: Box::pin(stdin),
                exited: async { Ok(false) }.boxed(),
            });
        }
        let quit_bytes = self.quit_bytes.clone();
        let exited = async move {
            let mut buf = [0u8; 1];
            loop {
                if process.read(&mut buf).await? == 0 {
                    return Ok(false);
                }
                if buf[..] == *QUIT_BYTE {
                    quit_bytes.fetch_add(1, Ordering::SeqCst);
                    return Ok(true);
                }
            }
        }
        .boxed();

        Ok(SpawnedCapture {
            stdin: Box::pin(stdin),
            exited,
        })
    }
}

pub struct Harness {
    pub services: Arc<ServiceContainer>,
    pub receiver: Option<BusReceiver>,
    pub client: Arc<FakeClient>,
    pub notifier: Arc<FakeNotifier>,
    pub launcher: Arc<FakeLauncher>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(streamers: Vec<Streamer>) -> Self {
        Self::with_config(streamers, |_, _| {})
    }

    /// Build with test defaults adjusted by `configure`, which also gets the
    /// temporary directory the output lives in.
    pub fn with_config(
        streamers: Vec<Streamer>,
        configure: impl FnOnce(&mut AppConfig, &Path),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            poll_interval_secs: 1,
            shutdown_grace_secs: 5,
            ..Default::default()
        };
        configure(&mut config, dir.path());
        let output_dir = config.output_dir(dir.path());

        let client = Arc::new(FakeClient::default());
        for streamer in &streamers {
            client.set_name(streamer.uid, &streamer.name);
        }
        let notifier = Arc::new(FakeNotifier::default());
        let launcher = Arc::new(FakeLauncher::default());
        let collaborators = Collaborators {
            client: client.clone(),
            notification: Arc::new(NotificationService::new(DesktopNotifier::disabled())),
            notifier: notifier.clone(),
            launcher: launcher.clone(),
        };

        let registry = Arc::new(StreamerRegistry::with_streamers(streamers));
        let (services, receiver) = ServiceContainer::new(
            config,
            output_dir,
            registry,
            collaborators,
            LogTail::default(),
        );

        Self {
            services,
            receiver: Some(receiver),
            client,
            notifier,
            launcher,
            dir,
        }
    }
}

/// A streamer with the given intents and every notification enabled.
pub fn streamer(uid: u64, name: &str, record: bool, danmu: bool) -> Streamer {
    let mut streamer = Streamer::new(uid, name);
    streamer.record = record;
    streamer.danmu = danmu;
    streamer.notify.notify_on = true;
    streamer.notify.notify_record = true;
    streamer.notify.notify_danmu = true;
    streamer
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
