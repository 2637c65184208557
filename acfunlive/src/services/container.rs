//! Service container for dependency injection.
//!
//! The ServiceContainer holds references to all application services and the
//! shared tables, and owns the root cancellation token and task tracker.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::WebServerHandle;
use crate::config::AppConfig;
use crate::control::{BusReceiver, ControlBus};
use crate::danmu::DanmuSupervisor;
use crate::logging::LogTail;
use crate::notification::{DesktopNotifier, NotificationService, Notifier};
use crate::platform::{AcfunClient, LiveClient, LiveRoom};
use crate::recorder::{FfmpegLauncher, ProcessLauncher, Recorder, RecorderContext};
use crate::state::{DanglingRecordings, StateTable};
use crate::streamer::StreamerRegistry;
use crate::utils::http_client::build_client;
use crate::Result;

/// External collaborators the orchestrator delegates to.
pub struct Collaborators {
    pub client: Arc<dyn LiveClient>,
    pub notification: Arc<NotificationService>,
    pub notifier: Arc<dyn Notifier>,
    pub launcher: Arc<dyn ProcessLauncher>,
}

impl Collaborators {
    /// The real AcFun client, desktop/Coolq notifications and ffmpeg.
    pub fn production(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(AcfunClient::new(build_client()?));
        let notification = Arc::new(NotificationService::new(DesktopNotifier::default()));
        Ok(Self {
            client,
            notifier: notification.clone(),
            notification,
            launcher: Arc::new(FfmpegLauncher::new(config.ffmpeg.clone())),
        })
    }
}

/// Service container holding all application services.
pub struct ServiceContainer {
    pub config: AppConfig,
    /// Directory receiving recordings and subtitle files.
    pub output_dir: PathBuf,
    pub registry: Arc<StreamerRegistry>,
    pub states: Arc<StateTable>,
    pub dangling: Arc<DanglingRecordings>,
    pub client: Arc<dyn LiveClient>,
    pub notification: Arc<NotificationService>,
    pub notifier: Arc<dyn Notifier>,
    pub recorder: Arc<Recorder>,
    pub danmu: Arc<DanmuSupervisor>,
    /// Sender side of the main control bus.
    pub bus: ControlBus,
    /// Tracks every long-running task so shutdown can wait for them.
    pub tasks: TaskTracker,
    /// Cached live-room listing.
    pub live_rooms: RwLock<Vec<LiveRoom>>,
    pub log_tail: LogTail,
    web: Mutex<Option<WebServerHandle>>,
    listening: AtomicBool,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build the container. The returned receiver belongs to the dispatcher.
    pub fn new(
        config: AppConfig,
        output_dir: PathBuf,
        registry: Arc<StreamerRegistry>,
        collaborators: Collaborators,
        log_tail: LogTail,
    ) -> (Arc<Self>, BusReceiver) {
        let Collaborators {
            client,
            notification,
            notifier,
            launcher,
        } = collaborators;

        let states = Arc::new(StateTable::new());
        let dangling = Arc::new(DanglingRecordings::new());
        let tasks = TaskTracker::new();
        let cancellation_token = CancellationToken::new();
        let (bus, receiver) = ControlBus::new();

        let recorder = Arc::new(Recorder::new(
            RecorderContext {
                client: client.clone(),
                registry: registry.clone(),
                states: states.clone(),
                dangling: dangling.clone(),
                notifier: notifier.clone(),
                launcher,
                tasks: tasks.clone(),
                root: cancellation_token.clone(),
            },
            config.source,
            output_dir.clone(),
        ));

        let danmu = Arc::new(DanmuSupervisor::new(
            client.clone(),
            registry.clone(),
            states.clone(),
            notifier.clone(),
            output_dir.clone(),
            tasks.clone(),
            cancellation_token.clone(),
        ));

        let container = Arc::new(Self {
            config,
            output_dir,
            registry,
            states,
            dangling,
            client,
            notification,
            notifier,
            recorder,
            danmu,
            bus,
            tasks,
            live_rooms: RwLock::new(Vec::new()),
            log_tail,
            web: Mutex::new(None),
            listening: AtomicBool::new(false),
            cancellation_token,
        });
        (container, receiver)
    }

    /// Get the root cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Whether the process runs as a long-lived listener.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::Release);
    }

    /// Install a running web server. Returns it back when one is already
    /// installed.
    pub fn install_web(&self, handle: WebServerHandle) -> std::result::Result<(), WebServerHandle> {
        let mut web = self.web.lock();
        if web.is_some() {
            return Err(handle);
        }
        *web = Some(handle);
        Ok(())
    }

    pub fn take_web(&self) -> Option<WebServerHandle> {
        self.web.lock().take()
    }

    pub fn web_running(&self) -> bool {
        self.web.lock().is_some()
    }
}
