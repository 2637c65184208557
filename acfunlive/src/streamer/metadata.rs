//! Streamer record as persisted in the roster file.

use serde::{Deserialize, Serialize};

/// Notification sub-flags of a streamer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notify {
    /// Notify when the streamer goes live or offline.
    pub notify_on: bool,
    /// Notify when a recording starts or ends.
    pub notify_record: bool,
    /// Notify when a danmu capture starts or ends.
    pub notify_danmu: bool,
}

/// Identity and desired configuration of a broadcaster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Streamer {
    pub uid: u64,
    pub name: String,
    pub notify: Notify,
    /// Automatically record the live video.
    pub record: bool,
    /// Automatically capture the live danmu.
    pub danmu: bool,
    /// QQ number that receives live notifications, 0 when unset.
    #[serde(rename = "sendQQ")]
    pub send_qq: u64,
    /// QQ group that receives live notifications, 0 when unset.
    #[serde(rename = "sendQQGroup")]
    pub send_qq_group: u64,
}

impl Streamer {
    pub fn new(uid: u64, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            ..Default::default()
        }
    }

    /// `name (uid)`, used in log lines.
    pub fn long_id(&self) -> String {
        format!("{} ({})", self.name, self.uid)
    }

    /// Whether any persistent intent is still enabled.
    pub fn has_intent(&self) -> bool {
        self.notify.notify_on || self.record || self.danmu
    }

    /// Whether live notifications go out over QQ.
    pub fn wants_qq(&self) -> bool {
        self.send_qq != 0 || self.send_qq_group != 0
    }

    /// Public live room URL.
    pub fn live_url(&self) -> String {
        live_room_url(self.uid)
    }
}

/// Public live room URL of `uid`.
pub fn live_room_url(uid: u64) -> String {
    format!("https://live.acfun.cn/live/{uid}")
}
