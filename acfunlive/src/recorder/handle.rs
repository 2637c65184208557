//! Handle of a running recording.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::control::ControlVerb;

/// Byte that asks ffmpeg to finish the file and exit.
pub const QUIT_BYTE: &[u8] = b"q";

/// Details of a running recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingInfo {
    pub name: String,
    pub title: String,
    /// Source URL of the stream being recorded.
    pub url: String,
    /// Current output file. Changes when the recording restarts.
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Started by a one-off command rather than by the streamer's settings.
    pub temporary: bool,
}

/// Receiving side of a [`RecordingHandle`], owned by the recording task.
#[derive(Debug)]
pub struct RecordingSignals {
    pub control: mpsc::UnboundedReceiver<ControlVerb>,
    pub stdin: mpsc::UnboundedReceiver<Bytes>,
}

/// State-table entry of a running recording.
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    /// Distinguishes this recording from a later one for the same streamer.
    pub id: u64,
    pub uid: u64,
    control: mpsc::UnboundedSender<ControlVerb>,
    stdin: mpsc::UnboundedSender<Bytes>,
    stop_requested: Arc<AtomicBool>,
    pub info: RecordingInfo,
}

impl RecordingHandle {
    pub fn new(id: u64, uid: u64, info: RecordingInfo) -> (Self, RecordingSignals) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            uid,
            control: control_tx,
            stdin: stdin_tx,
            stop_requested: Arc::new(AtomicBool::new(false)),
            info,
        };
        let signals = RecordingSignals {
            control: control_rx,
            stdin: stdin_rx,
        };
        (handle, signals)
    }

    /// Send a control verb to the recording task.
    pub fn send_control(&self, verb: ControlVerb) -> bool {
        self.control.send(verb).is_ok()
    }

    /// Write raw bytes to the capture process's standard input.
    pub fn write_stdin(&self, bytes: Bytes) -> bool {
        self.stdin.send(bytes).is_ok()
    }

    /// Signal `stopRecord` and write the quit byte to the process, once.
    ///
    /// Both sends are best-effort; a recording that already finished simply
    /// drops them. Later calls are no-ops.
    pub fn request_stop(&self) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.send_control(ControlVerb::StopRecord);
        self.write_stdin(Bytes::from_static(QUIT_BYTE));
    }

    /// Whether a stop was requested through [`request_stop`](Self::request_stop).
    pub fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.control.is_closed()
    }
}
