//! Danmu feed contract and the subtitle capture loop.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ass::{AssWriter, SubtitleConfig};
use crate::error::Result;

/// One viewer comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub sent_at: DateTime<Utc>,
    pub user_name: String,
    pub content: String,
}

impl Comment {
    pub fn new(user_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sent_at: Utc::now(),
            user_name: user_name.into(),
            content: content.into(),
        }
    }
}

/// A live danmu event stream for one broadcaster.
#[async_trait]
pub trait DanmuFeed: Send {
    /// Next comment, or `None` once the feed has ended.
    ///
    /// An error means the connection dropped; the caller treats it the same
    /// as the end of the feed.
    async fn next_comment(&mut self) -> Result<Option<Comment>>;
}

/// Stream comments from `feed` into the subtitle file at `path` until the
/// feed ends or `cancel` fires.
///
/// File errors are returned. Feed errors are interruptions and end the call
/// normally. Returns the number of comments written.
pub async fn write_subtitle_file(
    feed: &mut dyn DanmuFeed,
    cancel: &CancellationToken,
    config: &SubtitleConfig,
    path: &Path,
    truncate: bool,
) -> Result<u64> {
    let mut writer = AssWriter::open(path, config.clone(), truncate).await?;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = %path.display(), "Danmu capture cancelled");
                break;
            }
            next = feed.next_comment() => match next {
                Ok(Some(comment)) => writer.write_comment(&comment).await?,
                Ok(None) => {
                    debug!(path = %path.display(), "Danmu feed ended");
                    break;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Danmu feed interrupted");
                    break;
                }
            }
        }
    }

    writer.finish().await?;
    Ok(writer.comment_count())
}
