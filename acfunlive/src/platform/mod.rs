//! Live platform client contract.

mod acfun;
mod models;

pub use acfun::AcfunClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::danmu::{DanmuFeed, SubtitleConfig};
use crate::error::Result;

/// Playback parameters of a broadcaster's current live session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub hls_url: String,
    pub flv_url: String,
    /// Identity of the live session. Empty when the broadcaster is offline.
    pub stream_name: String,
    pub title: String,
    /// Subtitle layout matching the stream's resolution.
    pub subtitle: SubtitleConfig,
}

impl StreamInfo {
    /// The offline result.
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        !self.stream_name.is_empty()
    }

    /// Whether `other` belongs to the same live session.
    pub fn same_session(&self, other: &StreamInfo) -> bool {
        self.is_live() && self.stream_name == other.stream_name
    }
}

/// A live room from the platform's channel listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRoom {
    pub uid: u64,
    pub name: String,
    pub title: String,
}

/// Operations of the live platform used by the orchestrator.
#[async_trait]
pub trait LiveClient: Send + Sync + 'static {
    /// Resolve a broadcaster's current stream. Offline broadcasters resolve to
    /// a [`StreamInfo`] with an empty `stream_name`.
    async fn resolve_stream(&self, uid: u64) -> Result<StreamInfo>;

    /// Display name of a user, `None` when the uid does not exist.
    async fn user_name(&self, uid: u64) -> Result<Option<String>>;

    /// Rooms that are live right now.
    async fn live_rooms(&self) -> Result<Vec<LiveRoom>>;

    /// Connect to a broadcaster's danmu feed.
    async fn open_danmu_feed(
        &self,
        uid: u64,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DanmuFeed>>;
}
