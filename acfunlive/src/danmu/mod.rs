//! Danmu capture.
//!
//! - [`ass`]: ASS subtitle rendering
//! - [`feed`]: the danmu feed contract and the subtitle capture loop
//! - [`supervisor`]: per-streamer capture tasks with restart on disconnect

pub mod ass;
pub mod feed;
pub mod supervisor;

pub use ass::{AssWriter, SubtitleConfig};
pub use feed::{Comment, DanmuFeed, write_subtitle_file};
pub use supervisor::{DanmuHandle, DanmuInfo, DanmuSupervisor};
