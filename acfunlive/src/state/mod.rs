//! Per-streamer runtime state.
//!
//! The state table records, for each streamer that has anything running,
//! the worker mailbox, the active recording and the active danmu capture.
//! An entry exists only while at least one of these is present or the
//! streamer is still registered; [`StateTable::try_delete`] enforces this.

mod dangling;

pub use dangling::DanglingRecordings;

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::control::WorkerMailbox;
use crate::danmu::DanmuHandle;
use crate::recorder::RecordingHandle;
use crate::streamer::StreamerRegistry;

/// Runtime state of one streamer.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    /// Mailbox of the running cycle worker.
    pub worker: Option<WorkerMailbox>,
    /// Active video capture. `Some` means a recording is running.
    pub recording: Option<RecordingHandle>,
    /// Active danmu capture.
    pub danmu: Option<DanmuHandle>,
    /// Set when the streamer's intents changed since the worker last looked.
    pub modified: bool,
}

impl EntityState {
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_capturing_danmu(&self) -> bool {
        self.danmu.is_some()
    }

    pub fn has_worker(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_closed())
    }

    fn is_idle(&self) -> bool {
        self.recording.is_none() && self.danmu.is_none()
    }
}

/// Table of [`EntityState`] keyed by uid, guarded by a single lock.
#[derive(Debug, Default)]
pub struct StateTable {
    inner: Mutex<HashMap<u64, EntityState>>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one entry.
    pub fn get(&self, uid: u64) -> Option<EntityState> {
        self.inner.lock().get(&uid).cloned()
    }

    pub fn contains(&self, uid: u64) -> bool {
        self.inner.lock().contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutate the entry for `uid`, creating it first when it is missing.
    pub fn upsert<R>(&self, uid: u64, f: impl FnOnce(&mut EntityState) -> R) -> R {
        let mut inner = self.inner.lock();
        f(inner.entry(uid).or_default())
    }

    /// Mutate the entry for `uid` if it exists. Never creates an entry.
    pub fn update<R>(&self, uid: u64, f: impl FnOnce(&mut EntityState) -> R) -> Option<R> {
        self.inner.lock().get_mut(&uid).map(f)
    }

    /// Take the `modified` flag, clearing it.
    pub fn take_modified(&self, uid: u64) -> bool {
        self.update(uid, |s| std::mem::take(&mut s.modified))
            .unwrap_or(false)
    }

    /// Mark an existing entry as modified.
    pub fn mark_modified(&self, uid: u64) -> bool {
        self.update(uid, |s| s.modified = true).is_some()
    }

    /// Remove the entry for `uid` when the streamer is no longer registered
    /// and nothing is capturing for it.
    ///
    /// The registry lock is held for the whole check so that a concurrent
    /// re-registration cannot slip in between the check and the removal.
    pub fn try_delete(&self, uid: u64, registry: &StreamerRegistry) -> bool {
        registry.with_presence(uid, |registered| {
            if registered {
                return false;
            }
            let mut inner = self.inner.lock();
            match inner.get(&uid) {
                Some(state) if state.is_idle() => {
                    inner.remove(&uid);
                    debug!(uid, "Removed idle streamer state");
                    true
                }
                _ => false,
            }
        })
    }

    /// Visit every entry with the table lock held.
    pub fn for_each_mut(&self, mut f: impl FnMut(u64, &mut EntityState)) {
        let mut inner = self.inner.lock();
        for (uid, state) in inner.iter_mut() {
            f(*uid, state);
        }
    }

    /// Uids with an active recording, sorted.
    pub fn recording_uids(&self) -> Vec<u64> {
        self.uids_where(EntityState::is_recording)
    }

    /// Uids with an active danmu capture, sorted.
    pub fn danmu_uids(&self) -> Vec<u64> {
        self.uids_where(EntityState::is_capturing_danmu)
    }

    /// All uids with an entry, sorted.
    pub fn uids(&self) -> Vec<u64> {
        self.uids_where(|_| true)
    }

    fn uids_where(&self, pred: impl Fn(&EntityState) -> bool) -> Vec<u64> {
        let mut uids: Vec<u64> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(uid, _)| *uid)
            .collect();
        uids.sort_unstable();
        uids
    }
}
