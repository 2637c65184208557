//! Filename sanitization for capture outputs.
//!
//! Streamer names and live titles are user controlled and routinely contain
//! characters that are invalid on Windows, so every output path goes through
//! [`sanitize_filename`] before it touches the file system.

use std::path::{Path, PathBuf};

/// Characters that are invalid in Windows filenames
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Most file systems cap a single path component at 255 bytes.
const MAX_STEM_BYTES: usize = 200;

/// How many numbered alternatives are tried when the target already exists.
const MAX_COLLISION_ATTEMPTS: u32 = 100;

/// Sanitize a string for use in filenames across all platforms.
///
/// Control characters and Windows-invalid characters are replaced with an
/// underscore (consecutive replacements collapse), leading/trailing spaces and
/// dots are trimmed and reserved device names are prefixed. Returns an empty
/// string when nothing usable remains.
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || WINDOWS_INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = truncate_to_bytes(result.trim_matches(|c| c == ' ' || c == '.'), MAX_STEM_BYTES)
        .trim_end_matches([' ', '.']);

    if trimmed.chars().all(|c| c == '_') {
        return String::new();
    }

    let upper = trimmed.to_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", trimmed);
        }
    }

    trimmed.to_string()
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Derive a free output path `<dir>/<base>.<ext>`.
///
/// Returns `None` when the base name sanitizes to nothing or when no free
/// numbered alternative (`<base> (n).<ext>`) exists.
pub fn capture_path(dir: &Path, base_name: &str, ext: &str) -> Option<PathBuf> {
    let stem = sanitize_filename(base_name);
    if stem.is_empty() {
        return None;
    }

    let candidate = dir.join(format!("{}.{}", stem, ext));
    if !candidate.exists() {
        return Some(candidate);
    }

    (1..=MAX_COLLISION_ATTEMPTS)
        .map(|n| dir.join(format!("{} ({}).{}", stem, n, ext)))
        .find(|p| !p.exists())
}
