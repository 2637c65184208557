//! Application configuration.
//!
//! Settings live in `config.json` and the watched roster in `live.json`, both
//! stored in the application directory. Missing files are created with
//! defaults on first start; invalid values are fatal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// File name of the application settings.
pub const CONFIG_FILE: &str = "config.json";

/// File name of the persisted streamer roster.
pub const ROSTER_FILE: &str = "live.json";

/// Environment variable overriding the application directory.
pub const DIR_ENV: &str = "ACFUNLIVE_DIR";

/// Which stream flavour the recorder pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    #[default]
    Flv,
    Hls,
}

/// Coolq (OneBot HTTP API) delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolqConfig {
    /// Base URL of the cqhttp HTTP API.
    pub cqhttp_url: String,
    /// Optional access token sent as a bearer token.
    pub access_token: String,
    /// QQ number that receives administrative messages.
    pub admin_qq: u64,
}

impl Default for CoolqConfig {
    fn default() -> Self {
        Self {
            cqhttp_url: "http://127.0.0.1:5700".to_string(),
            access_token: String::new(),
            admin_qq: 0,
        }
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Stream source used for recordings.
    pub source: StreamSource,
    /// Output directory for recordings and danmu files. Empty means the
    /// application directory.
    pub output: String,
    /// Port of the HTTP status/command server.
    pub web_port: u16,
    /// Path of the ffmpeg binary used for recordings.
    pub ffmpeg: String,
    /// Seconds between live-status polls of one streamer.
    pub poll_interval_secs: u64,
    /// Seconds between roster file reloads.
    pub roster_reload_secs: u64,
    /// Seconds between refreshes of the live room listing.
    pub live_list_refresh_secs: u64,
    /// Upper bound on the shutdown grace period.
    pub shutdown_grace_secs: u64,
    /// Coolq settings.
    pub coolq: CoolqConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: StreamSource::Flv,
            output: String::new(),
            web_port: 51880,
            ffmpeg: "ffmpeg".to_string(),
            poll_interval_secs: 20,
            roster_reload_secs: 10,
            live_list_refresh_secs: 60,
            shutdown_grace_secs: 20,
            coolq: CoolqConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `config.json`, creating it with defaults when it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            let data = serde_json::to_string_pretty(&config)?;
            std::fs::write(path, data)?;
            info!(path = %path.display(), "Created default configuration file");
            return Ok(config);
        }

        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::config(format!("{} is not valid: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.web_port < 1024 {
            return Err(Error::config(format!(
                "web_port must be between 1024 and 65535, got {}",
                self.web_port
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::config("poll_interval_secs must be greater than 0"));
        }
        if self.roster_reload_secs == 0 {
            return Err(Error::config("roster_reload_secs must be greater than 0"));
        }
        if self.ffmpeg.trim().is_empty() {
            return Err(Error::config("ffmpeg must not be empty"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn roster_reload_interval(&self) -> Duration {
        Duration::from_secs(self.roster_reload_secs)
    }

    pub fn live_list_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.live_list_refresh_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Resolve the output directory against the application directory.
    pub fn output_dir(&self, app_dir: &Path) -> PathBuf {
        if self.output.trim().is_empty() {
            app_dir.to_path_buf()
        } else {
            PathBuf::from(&self.output)
        }
    }
}

/// Locations of the files the application reads and writes.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub dir: PathBuf,
    pub config_file: PathBuf,
    pub roster_file: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config_file: dir.join(CONFIG_FILE),
            roster_file: dir.join(ROSTER_FILE),
            log_dir: dir.join("logs"),
            dir,
        }
    }

    /// Pick the application directory: explicit argument, then
    /// `ACFUNLIVE_DIR`, then the directory of the executable.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        if let Ok(dir) = std::env::var(DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Ok(Self::new(dir));
        }
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| Error::config("cannot determine the executable directory"))?;
        Ok(Self::new(dir))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source, StreamSource::Flv);
        assert_eq!(config.web_port, 51880);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let config = AppConfig {
            web_port: 80,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let created = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.web_port, 51880);

        std::fs::write(&path, r#"{"source": "hls", "web_port": 8080}"#).unwrap();
        let loaded = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded.source, StreamSource::Hls);
        assert_eq!(loaded.web_port, 8080);
        assert_eq!(loaded.poll_interval_secs, 20);
    }

    #[test]
    fn test_unknown_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"source": "rtmp"}"#).unwrap();
        assert!(matches!(
            AppConfig::load_or_create(&path),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_output_dir() {
        let app_dir = Path::new("/opt/acfunlive");
        let config = AppConfig::default();
        assert_eq!(config.output_dir(app_dir), app_dir);

        let config = AppConfig {
            output: "/data/live".to_string(),
            ..Default::default()
        };
        assert_eq!(config.output_dir(app_dir), PathBuf::from("/data/live"));
    }
}
