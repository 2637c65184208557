//! User notifications.
//!
//! - Desktop notifications through the platform's notifier binary
//! - QQ messages through a Coolq (OneBot) HTTP endpoint
//!
//! Delivery is fire-and-forget: failures are logged and never returned to
//! the caller.

mod coolq;
mod desktop;

pub use coolq::CoolqClient;
pub use desktop::DesktopNotifier;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::CoolqConfig;
use crate::streamer::Streamer;

/// Sink for user-visible notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a desktop notification.
    async fn desktop(&self, message: &str);

    /// Send `message` to the QQ user and group configured for `streamer`.
    async fn qq(&self, streamer: &Streamer, message: &str);
}

/// Fans notifications out to the desktop and, once started, to Coolq.
#[derive(Debug, Default)]
pub struct NotificationService {
    desktop: DesktopNotifier,
    coolq: RwLock<Option<CoolqClient>>,
}

impl NotificationService {
    pub fn new(desktop: DesktopNotifier) -> Self {
        Self {
            desktop,
            coolq: RwLock::new(None),
        }
    }

    /// Enable QQ delivery. Returns `false` when it was already enabled or
    /// the client could not be built.
    pub fn start_coolq(&self, config: &CoolqConfig) -> bool {
        let mut coolq = self.coolq.write();
        if coolq.is_some() {
            warn!("Coolq delivery is already enabled");
            return false;
        }
        match CoolqClient::new(config) {
            Ok(client) => {
                info!(url = %config.cqhttp_url, "Enabled Coolq delivery");
                *coolq = Some(client);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to start Coolq delivery");
                false
            }
        }
    }

    pub fn coolq_enabled(&self) -> bool {
        self.coolq.read().is_some()
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn desktop(&self, message: &str) {
        info!("{message}");
        if let Err(e) = self.desktop.notify(message).await {
            warn!(error = %e, "Desktop notification failed");
        }
    }

    async fn qq(&self, streamer: &Streamer, message: &str) {
        if !streamer.wants_qq() {
            return;
        }
        let Some(client) = self.coolq.read().clone() else {
            return;
        };
        if streamer.send_qq != 0 {
            if let Err(e) = client.send_private_msg(streamer.send_qq, message).await {
                warn!(uid = streamer.uid, qq = streamer.send_qq, error = %e, "QQ notification failed");
            }
        }
        if streamer.send_qq_group != 0 {
            if let Err(e) = client.send_group_msg(streamer.send_qq_group, message).await {
                warn!(uid = streamer.uid, group = streamer.send_qq_group, error = %e, "QQ group notification failed");
            }
        }
    }
}
