//! ASS subtitle writer for danmu comments.
//!
//! Comments scroll from right to left across the frame. Each comment is
//! placed on the first lane whose previous comment has fully entered the
//! frame, falling back to the least recently used lane.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::feed::Comment;
use crate::error::Result;

/// How long one comment stays on screen.
pub const SCROLL_DURATION: Duration = Duration::from_secs(10);

const FONT_NAME: &str = "Microsoft YaHei";

/// Rendering parameters of a subtitle file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleConfig {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub font_size: u32,
    /// Script title, the capture's base file name.
    pub title: String,
    /// Wall-clock time that maps to subtitle time zero.
    pub start_time: DateTime<Utc>,
}

impl SubtitleConfig {
    /// Parameters for a stream of the given vertical resolution.
    ///
    /// Unknown resolutions get the portrait layout used by mobile streams.
    pub fn for_resolution(height: u32) -> Self {
        let (play_res_x, play_res_y, font_size) = match height {
            540 => (960, 540, 30),
            720 => (1280, 720, 40),
            1080 => (1920, 1080, 60),
            _ => (720, 1280, 60),
        };
        Self {
            play_res_x,
            play_res_y,
            font_size,
            title: String::new(),
            start_time: DateTime::<Utc>::default(),
        }
    }

    fn lane_count(&self) -> usize {
        (self.play_res_y / self.font_size.max(1)).max(1) as usize
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self::for_resolution(0)
    }
}

/// Streaming ASS writer.
pub struct AssWriter {
    path: PathBuf,
    file: File,
    config: SubtitleConfig,
    /// Subtitle time at which each lane becomes free again.
    lanes: Vec<Duration>,
    comment_count: u64,
}

impl AssWriter {
    /// Open `path` for writing.
    ///
    /// With `truncate` the file is recreated and the script header written;
    /// otherwise new events are appended to the existing file, and the header
    /// is only written when the file did not exist yet.
    pub async fn open(path: &Path, config: SubtitleConfig, truncate: bool) -> Result<Self> {
        let existed = tokio::fs::metadata(path).await.is_ok();
        let file = if truncate {
            File::create(path).await?
        } else {
            OpenOptions::new().create(true).append(true).open(path).await?
        };

        let lanes = vec![Duration::ZERO; config.lane_count()];
        let mut writer = Self {
            path: path.to_path_buf(),
            file,
            config,
            lanes,
            comment_count: 0,
        };

        if truncate || !existed {
            writer.write_header().await?;
        }
        Ok(writer)
    }

    /// Get the output path of this writer.
    pub fn output_path(&self) -> &Path {
        &self.path
    }

    /// Number of comments written by this writer.
    pub fn comment_count(&self) -> u64 {
        self.comment_count
    }

    async fn write_header(&mut self) -> Result<()> {
        let header = render_header(&self.config);
        self.file.write_all(header.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    /// Append one comment as a scrolling dialogue event.
    pub async fn write_comment(&mut self, comment: &Comment) -> Result<()> {
        let start = (comment.sent_at - self.config.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let lane = self.pick_lane(start, &comment.content);
        let line = render_dialogue(&self.config, lane, start, comment);
        self.file.write_all(line.as_bytes()).await?;
        self.comment_count += 1;

        if self.comment_count % 50 == 0 {
            self.file.flush().await?;
        }
        Ok(())
    }

    /// Flush buffered events to disk.
    pub async fn finish(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }

    fn pick_lane(&mut self, start: Duration, text: &str) -> usize {
        let lane = self
            .lanes
            .iter()
            .position(|free_at| *free_at <= start)
            .unwrap_or_else(|| {
                self.lanes
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, free_at)| **free_at)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            });

        // The lane is free once the tail of the text has entered the frame.
        let width = text_width(&self.config, text) as f64;
        let travel = (self.config.play_res_x as f64 + width) / SCROLL_DURATION.as_secs_f64();
        let enter = Duration::from_secs_f64(width / travel.max(1.0));
        self.lanes[lane] = start + enter;
        lane
    }
}

fn text_width(config: &SubtitleConfig, text: &str) -> u32 {
    text.chars().count() as u32 * config.font_size
}

fn render_header(config: &SubtitleConfig) -> String {
    format!(
        "[Script Info]\n\
         Title: {title}\n\
         ScriptType: v4.00+\n\
         Collisions: Normal\n\
         PlayResX: {x}\n\
         PlayResY: {y}\n\
         Timer: 100.0000\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Danmu,{font},{size},&H00FFFFFF,&H00FFFFFF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,1,0,7,0,0,0,1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        title = escape_ass(&config.title),
        x = config.play_res_x,
        y = config.play_res_y,
        font = FONT_NAME,
        size = config.font_size,
    )
}

fn render_dialogue(config: &SubtitleConfig, lane: usize, start: Duration, comment: &Comment) -> String {
    let y = lane as u32 * config.font_size;
    let width = text_width(config, &comment.content);
    format!(
        "Dialogue: 0,{},{},Danmu,{},0,0,0,,{{\\move({},{},-{},{})}}{}\n",
        format_timestamp(start),
        format_timestamp(start + SCROLL_DURATION),
        escape_ass_field(&comment.user_name),
        config.play_res_x,
        y,
        width,
        y,
        escape_ass(&comment.content),
    )
}

/// Format a subtitle timestamp as `H:MM:SS.cc`.
pub fn format_timestamp(offset: Duration) -> String {
    let centis = offset.as_millis() / 10;
    let (hours, rest) = (centis / 360_000, centis % 360_000);
    let (minutes, rest) = (rest / 6_000, rest % 6_000);
    let (seconds, centis) = (rest / 100, rest % 100);
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Keep user text from being parsed as override tags or line breaks.
pub fn escape_ass(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('{', "｛")
        .replace('}', "｝")
        .replace(['\n', '\r'], " ")
}

/// Like [`escape_ass`], for text placed in a comma-separated Dialogue field.
pub fn escape_ass_field(s: &str) -> String {
    escape_ass(s).replace(',', "，")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(config: &SubtitleConfig, secs: i64, text: &str) -> Comment {
        Comment {
            sent_at: config.start_time + chrono::Duration::seconds(secs),
            user_name: "viewer".to_string(),
            content: text.to_string(),
        }
    }

    #[test]
    fn test_resolution_table() {
        let c = SubtitleConfig::for_resolution(720);
        assert_eq!((c.play_res_x, c.play_res_y, c.font_size), (1280, 720, 40));
        let c = SubtitleConfig::for_resolution(1080);
        assert_eq!((c.play_res_x, c.play_res_y, c.font_size), (1920, 1080, 60));
        let c = SubtitleConfig::for_resolution(540);
        assert_eq!((c.play_res_x, c.play_res_y, c.font_size), (960, 540, 30));
        let c = SubtitleConfig::for_resolution(480);
        assert_eq!((c.play_res_x, c.play_res_y, c.font_size), (720, 1280, 60));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::ZERO), "0:00:00.00");
        assert_eq!(format_timestamp(Duration::from_millis(61_230)), "0:01:01.23");
        assert_eq!(format_timestamp(Duration::from_secs(3_725)), "1:02:05.00");
    }

    #[test]
    fn test_escape_ass() {
        assert_eq!(escape_ass("{\\b1}hi"), "｛\\\\b1｝hi");
        assert_eq!(escape_ass("a\nb"), "a b");
    }

    #[tokio::test]
    async fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.ass");
        let mut config = SubtitleConfig::for_resolution(720);
        config.title = "capture".to_string();
        config.start_time = Utc::now();

        let mut writer = AssWriter::open(&path, config.clone(), true).await.unwrap();
        writer.write_comment(&comment(&config, 2, "hello")).await.unwrap();
        writer.finish().await.unwrap();
        assert_eq!(writer.comment_count(), 1);

        let mut writer = AssWriter::open(&path, config.clone(), false).await.unwrap();
        writer.write_comment(&comment(&config, 5, "again")).await.unwrap();
        writer.finish().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("[Script Info]").count(), 1);
        assert!(text.contains("Title: capture"));
        assert!(text.contains("Dialogue: 0,0:00:02.00,0:00:12.00,Danmu,viewer"));
        assert!(text.contains("Dialogue: 0,0:00:05.00,0:00:15.00,Danmu,viewer"));
    }

    #[test]
    fn test_comma_in_user_name_keeps_dialogue_fields() {
        let mut config = SubtitleConfig::for_resolution(720);
        config.start_time = Utc::now();
        let mut c = comment(&config, 1, "hi, there");
        c.user_name = "a,b".to_string();

        let line = render_dialogue(&config, 0, Duration::from_secs(1), &c);
        let fields: Vec<&str> = line.trim_end().splitn(10, ',').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[4], "a，b");
        assert!(fields[9].ends_with("hi, there"));
    }

    #[test]
    fn test_header_title_stays_on_one_line() {
        let mut config = SubtitleConfig::for_resolution(720);
        config.title = "line one\nline two".to_string();
        let header = render_header(&config);
        assert!(header.contains("Title: line one line two\n"));
        assert!(header.contains("ScriptType: v4.00+"));
    }

    #[tokio::test]
    async fn test_busy_lane_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanes.ass");
        let mut config = SubtitleConfig::for_resolution(720);
        config.start_time = Utc::now();

        let mut writer = AssWriter::open(&path, config.clone(), true).await.unwrap();
        assert_eq!(writer.pick_lane(Duration::from_secs(1), "a long comment here"), 0);
        assert_eq!(writer.pick_lane(Duration::from_secs(1), "second"), 1);
        assert_eq!(writer.pick_lane(Duration::from_secs(30), "later"), 0);
    }
}
