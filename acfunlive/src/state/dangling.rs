//! Recordings detached from their streamer.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::recorder::RecordingHandle;

/// Recordings whose streamer was removed from the roster while they were
/// still running. They keep running until their process exits, and are
/// still stopped at shutdown.
#[derive(Debug, Default)]
pub struct DanglingRecordings {
    inner: Mutex<HashMap<u64, RecordingHandle>>,
}

impl DanglingRecordings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a detached recording under its recording id.
    pub fn insert(&self, handle: RecordingHandle) {
        self.inner.lock().insert(handle.id, handle);
    }

    pub fn remove(&self, recording_id: u64) -> Option<RecordingHandle> {
        self.inner.lock().remove(&recording_id)
    }

    pub fn contains(&self, recording_id: u64) -> bool {
        self.inner.lock().contains_key(&recording_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the detached recordings.
    pub fn list(&self) -> Vec<RecordingHandle> {
        self.inner.lock().values().cloned().collect()
    }

    /// Visit every detached recording with the lock held.
    pub fn for_each(&self, mut f: impl FnMut(&RecordingHandle)) {
        for handle in self.inner.lock().values() {
            f(handle);
        }
    }
}
