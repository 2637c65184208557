//! Command execution.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{Arity, Command, help_text};
use crate::api;
use crate::control::ControlMessage;
use crate::services::ServiceContainer;
use crate::streamer::{
    Intent, QqTarget, add_intent, clear_qq_target, live_room_url, remove_intent, set_qq_target,
};

/// One entry of the `list*` command outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Streaming {
    pub uid: u64,
    pub name: String,
    pub title: String,
    pub url: String,
}

impl Streaming {
    fn new(uid: u64, name: String, title: String) -> Self {
        Self {
            uid,
            name,
            title,
            url: live_room_url(uid),
        }
    }
}

/// Executes text commands against the running services.
#[derive(Clone)]
pub struct CommandHandler {
    services: Arc<ServiceContainer>,
}

impl CommandHandler {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    /// Parse and run one command line such as `adddanmu 42`.
    ///
    /// Unknown commands and bad arguments are logged and produce an empty
    /// string.
    pub async fn handle_line(&self, line: &str) -> String {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return String::new();
        };
        let args: Vec<&str> = parts.collect();
        self.handle(name, &args).await
    }

    /// Run command `name` with textual arguments.
    pub async fn handle(&self, name: &str, args: &[&str]) -> String {
        let Ok(cmd) = Command::from_str(&name.to_lowercase()) else {
            error!("Unknown command: {name}, run `help` to list the commands");
            return String::new();
        };

        let numbers: Result<Vec<u64>, _> = args.iter().map(|a| a.parse::<u64>()).collect();
        let numbers = match numbers {
            Ok(numbers) => numbers,
            Err(_) => {
                error!("Arguments of {name} must be numbers: {args:?}");
                return String::new();
            }
        };

        match (cmd.arity(), numbers.as_slice()) {
            (Arity::None, []) => self.run(cmd).await,
            (Arity::Uid, [uid]) if *uid != 0 => self.run_uid(cmd, *uid).await,
            (Arity::UidAndQq, [uid, qq]) if *uid != 0 => self.run_qq(cmd, *uid, *qq).await,
            _ => {
                error!("Wrong arguments for {name}: {args:?}, run `help` to list the commands");
                String::new()
            }
        }
    }

    async fn run(&self, cmd: Command) -> String {
        let services = &self.services;
        match cmd {
            Command::ListLive => to_json(&self.list_live()),
            Command::ListRecord => to_json(&self.list_record()),
            Command::ListDanmu => to_json(&self.list_danmu()),
            Command::ListStreamer => to_json(&services.registry.list()),
            Command::StartWeb => match api::start_web(services).await {
                Ok(started) => started.to_string(),
                Err(e) => {
                    error!(error = %e, "Failed to start the web server");
                    false.to_string()
                }
            },
            Command::StopWeb => api::stop_web(services).await.to_string(),
            Command::StartCoolq => services
                .notification
                .start_coolq(&services.config.coolq)
                .to_string(),
            Command::Quit => match services.bus.send(ControlMessage::quit()).await {
                Ok(()) => true.to_string(),
                Err(e) => {
                    error!(error = %e, "Failed to request shutdown");
                    false.to_string()
                }
            },
            Command::Help => help_text(),
            _ => String::new(),
        }
    }

    async fn run_uid(&self, cmd: Command, uid: u64) -> String {
        let result = match cmd {
            Command::AddNotify => self.add(uid, Intent::Notify).await,
            Command::DelNotify => self.del(uid, Intent::Notify),
            Command::AddRecord => self.add(uid, Intent::Record).await,
            Command::DelRecord => self.del(uid, Intent::Record),
            Command::AddDanmu => self.add(uid, Intent::Danmu).await,
            Command::DelDanmu => self.del(uid, Intent::Danmu),
            Command::StartRecord => self.start_record(uid).await,
            Command::StopRecord => self.services.recorder.stop_recording(uid),
            Command::StartDanmu => self.start_danmu(uid).await,
            Command::StopDanmu => self.services.danmu.stop_danmu(uid),
            Command::StartRecDan => {
                let recording = self.start_record(uid).await;
                recording && self.start_danmu(uid).await
            }
            Command::StopRecDan => {
                let recording = self.services.recorder.stop_recording(uid);
                let danmu = self.services.danmu.stop_danmu(uid);
                recording || danmu
            }
            Command::DelQq => self.clear_qq(uid, QqTarget::User),
            Command::DelQqGroup => self.clear_qq(uid, QqTarget::Group),
            Command::GetDlUrl => return self.download_urls(uid).await,
            _ => return String::new(),
        };
        result.to_string()
    }

    async fn run_qq(&self, cmd: Command, uid: u64, qq: u64) -> String {
        let target = match cmd {
            Command::AddQq => QqTarget::User,
            Command::AddQqGroup => QqTarget::Group,
            _ => return String::new(),
        };
        let services = &self.services;
        let set = match set_qq_target(&services.registry, services.client.as_ref(), uid, target, qq).await {
            Ok(()) => true,
            Err(e) => {
                warn!(uid, error = %e, "Failed to set the QQ {target} recipient");
                false
            }
        };
        set.to_string()
    }

    async fn add(&self, uid: u64, intent: Intent) -> bool {
        let services = &self.services;
        match add_intent(&services.registry, services.client.as_ref(), uid, intent).await {
            Ok(_) => true,
            Err(e) => {
                warn!(uid, error = %e, "Failed to enable {intent}");
                false
            }
        }
    }

    fn del(&self, uid: u64, intent: Intent) -> bool {
        match remove_intent(&self.services.registry, uid, intent) {
            Ok(_) => {
                self.services
                    .states
                    .try_delete(uid, &self.services.registry);
                true
            }
            Err(e) => {
                warn!(uid, error = %e, "Failed to disable {intent}");
                false
            }
        }
    }

    fn clear_qq(&self, uid: u64, target: QqTarget) -> bool {
        clear_qq_target(&self.services.registry, uid, target).unwrap_or_else(|e| {
            warn!(uid, error = %e, "Failed to clear the QQ {target} recipient");
            false
        })
    }

    async fn start_record(&self, uid: u64) -> bool {
        match self.services.recorder.start_recording(uid, true).await {
            Ok(_) => true,
            Err(e) => {
                warn!(uid, error = %e, "Cannot start recording");
                false
            }
        }
    }

    async fn start_danmu(&self, uid: u64) -> bool {
        match self.services.danmu.start_danmu(uid).await {
            Ok(_) => {
                if self.services.is_listening() {
                    info!(uid, "Run `stopdanmu {uid}` to stop the danmu capture");
                }
                true
            }
            Err(e) => {
                warn!(uid, error = %e, "Cannot start danmu capture");
                false
            }
        }
    }

    async fn download_urls(&self, uid: u64) -> String {
        let urls = match self.services.client.resolve_stream(uid).await {
            Ok(stream) if stream.is_live() => {
                info!(uid, hls = %stream.hls_url, flv = %stream.flv_url, "Stream URLs");
                [stream.hls_url, stream.flv_url]
            }
            Ok(_) => {
                warn!(uid, "Not live, no stream URLs");
                Default::default()
            }
            Err(e) => {
                warn!(uid, error = %e, "Failed to resolve the stream");
                Default::default()
            }
        };
        to_json(&urls)
    }

    pub fn list_live(&self) -> Vec<Streaming> {
        self.services
            .live_rooms
            .read()
            .iter()
            .map(|room| Streaming::new(room.uid, room.name.clone(), room.title.clone()))
            .collect()
    }

    pub fn list_record(&self) -> Vec<Streaming> {
        let states = &self.services.states;
        states
            .recording_uids()
            .into_iter()
            .filter_map(|uid| {
                let info = states.get(uid)?.recording?.info;
                Some(Streaming::new(uid, info.name, info.title))
            })
            .collect()
    }

    pub fn list_danmu(&self) -> Vec<Streaming> {
        let states = &self.services.states;
        states
            .danmu_uids()
            .into_iter()
            .filter_map(|uid| {
                let info = states.get(uid)?.danmu?.info;
                Some(Streaming::new(uid, info.name, info.title))
            })
            .collect()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode command output");
        String::new()
    })
}
