use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

const APP_TITLE: &str = "AcFun Live";

/// Desktop notifications through `notify-send` (Linux) or `osascript`
/// (macOS). On other systems, or when disabled, messages only go to the log.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    enabled: bool,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// A notifier that never spawns a process.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub async fn notify(&self, message: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(mut command) = notifier_command(message) else {
            debug!("No desktop notifier on this platform");
            return Ok(());
        };

        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Notification(format!("Failed to run desktop notifier: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Notification(format!(
                "Desktop notifier exited with {status}"
            )))
        }
    }
}

#[cfg(target_os = "macos")]
fn notifier_command(message: &str) -> Option<Command> {
    let script = format!(
        "display notification {} with title {}",
        apple_script_string(message),
        apple_script_string(APP_TITLE)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    Some(command)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn notifier_command(message: &str) -> Option<Command> {
    let mut command = Command::new("notify-send");
    command.arg(APP_TITLE).arg(message);
    Some(command)
}

#[cfg(not(unix))]
fn notifier_command(_message: &str) -> Option<Command> {
    None
}

#[cfg(target_os = "macos")]
fn apple_script_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
