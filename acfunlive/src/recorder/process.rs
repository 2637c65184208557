//! Capture process launching.

use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::AsyncWrite;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A running capture process.
pub struct SpawnedCapture {
    /// The process's standard input.
    pub stdin: Pin<Box<dyn AsyncWrite + Send>>,
    /// Resolves when the process exits, with whether it exited successfully.
    pub exited: BoxFuture<'static, std::io::Result<bool>>,
}

/// Starts capture processes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, url: &str, output: &Path) -> Result<SpawnedCapture>;
}

/// Launches `ffmpeg -i <url> -c copy <output>`.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    binary_path: String,
}

impl FfmpegLauncher {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    fn build_args(url: &str, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-timeout".to_string(),
            "10000000".to_string(),
            "-i".to_string(),
            url.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl ProcessLauncher for FfmpegLauncher {
    fn launch(&self, url: &str, output: &Path) -> Result<SpawnedCapture> {
        let args = Self::build_args(url, output);
        info!("Starting ffmpeg with args: {:?}", args);

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Recording(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Recording("Failed to capture ffmpeg stdin".to_string()))?;

        let exited = async move {
            let status = child.wait().await?;
            debug!("ffmpeg exited with {status}");
            Ok(status.success())
        }
        .boxed();

        Ok(SpawnedCapture {
            stdin: Box::pin(stdin),
            exited,
        })
    }
}
