//! Small shared helpers.

pub mod filename;
pub mod http_client;

use chrono::Local;

/// Local wall-clock timestamp used as the prefix of capture file names.
pub fn file_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H-%M-%S").to_string()
}

/// Base name shared by a capture's video and subtitle files:
/// `<timestamp> <name> <title>`.
pub fn capture_base_name(name: &str, title: &str) -> String {
    format!("{} {} {}", file_timestamp(), name, title)
}
