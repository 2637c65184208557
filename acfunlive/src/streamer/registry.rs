//! Streamer registry.
//!
//! The registry is the single source of truth for which broadcasters are
//! watched and what is enabled for each of them. Every mutation is written
//! through to the roster file.
//!
//! Lock order: when both the registry lock and the state-table lock are
//! needed, the registry lock is taken first. [`StreamerRegistry::with_presence`]
//! is the only place that calls out while holding the registry lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::metadata::Streamer;
use crate::error::{Error, Result};

/// Difference between the roster the scheduler last acted on and the
/// current roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub added: Vec<Streamer>,
    pub removed: Vec<Streamer>,
    pub changed: Vec<Streamer>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Current roster.
    current: BTreeMap<u64, Streamer>,
    /// Roster as of the last [`StreamerRegistry::take_diff`].
    applied: BTreeMap<u64, Streamer>,
    /// Modification time of the roster file after our last read or write.
    file_mtime: Option<SystemTime>,
}

/// Thread-safe streamer roster with write-through JSON persistence.
#[derive(Debug)]
pub struct StreamerRegistry {
    path: Option<PathBuf>,
    inner: Mutex<RegistryInner>,
}

impl StreamerRegistry {
    /// A registry that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// A non-persisted registry pre-filled with `streamers`.
    pub fn with_streamers(streamers: impl IntoIterator<Item = Streamer>) -> Self {
        let current: BTreeMap<u64, Streamer> =
            streamers.into_iter().map(|s| (s.uid, s)).collect();
        Self {
            path: None,
            inner: Mutex::new(RegistryInner {
                applied: current.clone(),
                current,
                file_mtime: None,
            }),
        }
    }

    /// Open the roster file, creating an empty one when it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            std::fs::write(&path, "[]")?;
            info!(path = %path.display(), "Created empty roster file");
        }

        let current = read_roster(&path)?;
        info!(count = current.len(), "Loaded streamer roster");

        Ok(Self {
            inner: Mutex::new(RegistryInner {
                applied: current.clone(),
                current,
                file_mtime: file_mtime(&path),
            }),
            path: Some(path),
        })
    }

    pub fn get(&self, uid: u64) -> Option<Streamer> {
        self.inner.lock().current.get(&uid).cloned()
    }

    pub fn contains(&self, uid: u64) -> bool {
        self.inner.lock().current.contains_key(&uid)
    }

    /// Name of a registered streamer.
    pub fn name(&self, uid: u64) -> Option<String> {
        self.inner.lock().current.get(&uid).map(|s| s.name.clone())
    }

    /// All registered streamers ordered by uid.
    pub fn list(&self) -> Vec<Streamer> {
        self.inner.lock().current.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a streamer.
    pub fn set(&self, streamer: Streamer) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.current.get(&streamer.uid) == Some(&streamer) {
            return Ok(());
        }
        debug!(uid = streamer.uid, "Setting streamer");
        inner.current.insert(streamer.uid, streamer);
        self.persist(&mut inner)
    }

    /// Remove a streamer, returning the removed record.
    pub fn delete(&self, uid: u64) -> Result<Option<Streamer>> {
        let mut inner = self.inner.lock();
        let removed = inner.current.remove(&uid);
        if removed.is_some() {
            debug!(uid, "Deleted streamer");
            self.persist(&mut inner)?;
        }
        Ok(removed)
    }

    /// Atomically modify an existing streamer.
    ///
    /// Returns `None` when the streamer is not registered. The record is
    /// removed instead of stored when `f` leaves it without any intent and
    /// `remove_when_idle` is set.
    pub fn modify<R>(
        &self,
        uid: u64,
        remove_when_idle: bool,
        f: impl FnOnce(&mut Streamer) -> R,
    ) -> Result<Option<R>> {
        let mut inner = self.inner.lock();
        let Some(existing) = inner.current.get(&uid) else {
            return Ok(None);
        };

        let mut updated = existing.clone();
        let result = f(&mut updated);

        if remove_when_idle && !updated.has_intent() {
            inner.current.remove(&uid);
        } else if inner.current.get(&uid) != Some(&updated) {
            inner.current.insert(uid, updated);
        } else {
            return Ok(Some(result));
        }

        self.persist(&mut inner)?;
        Ok(Some(result))
    }

    /// Atomically modify a streamer, inserting `create()` first when it is
    /// not registered.
    pub fn upsert_with<R>(
        &self,
        uid: u64,
        create: impl FnOnce() -> Streamer,
        f: impl FnOnce(&mut Streamer) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.lock();
        let before = inner.current.get(&uid).cloned();
        let mut updated = before.clone().unwrap_or_else(create);
        let result = f(&mut updated);

        if before.as_ref() != Some(&updated) {
            inner.current.insert(uid, updated);
            self.persist(&mut inner)?;
        }
        Ok(result)
    }

    /// Run `f` with the registry lock held, telling it whether `uid` is
    /// registered. Used by the state table to make "absent from the registry"
    /// checks atomic with its own bookkeeping.
    pub fn with_presence<R>(&self, uid: u64, f: impl FnOnce(bool) -> R) -> R {
        let inner = self.inner.lock();
        f(inner.current.contains_key(&uid))
    }

    /// Re-read the roster file when it was modified by someone else.
    ///
    /// Returns `true` when the in-memory roster was replaced.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let mtime = file_mtime(path);
        {
            let inner = self.inner.lock();
            if mtime.is_none() || mtime == inner.file_mtime {
                return Ok(false);
            }
        }

        let roster = read_roster(path)?;
        let mut inner = self.inner.lock();
        inner.current = roster;
        inner.file_mtime = mtime;
        info!(count = inner.current.len(), "Reloaded streamer roster");
        Ok(true)
    }

    /// Compare the current roster against the one seen by the previous call
    /// and mark the current roster as seen.
    pub fn take_diff(&self) -> RosterDiff {
        let mut inner = self.inner.lock();
        let mut diff = RosterDiff::default();

        for (uid, streamer) in &inner.current {
            match inner.applied.get(uid) {
                None => diff.added.push(streamer.clone()),
                Some(old) if old != streamer => diff.changed.push(streamer.clone()),
                Some(_) => {}
            }
        }
        for (uid, streamer) in &inner.applied {
            if !inner.current.contains_key(uid) {
                diff.removed.push(streamer.clone());
            }
        }

        inner.applied = inner.current.clone();
        diff
    }

    fn persist(&self, inner: &mut RegistryInner) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let roster: Vec<&Streamer> = inner.current.values().collect();
        let data = serde_json::to_string_pretty(&roster)?;
        std::fs::write(path, data)?;
        inner.file_mtime = file_mtime(path);
        Ok(())
    }
}

fn read_roster(path: &Path) -> Result<BTreeMap<u64, Streamer>> {
    let data = std::fs::read_to_string(path)?;
    let streamers: Vec<Streamer> = serde_json::from_str(&data)
        .map_err(|e| Error::config(format!("{} is not valid: {}", path.display(), e)))?;
    Ok(streamers.into_iter().map(|s| (s.uid, s)).collect())
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streamer(uid: u64) -> Streamer {
        let mut s = Streamer::new(uid, format!("streamer{}", uid));
        s.notify.notify_on = true;
        s
    }

    #[test]
    fn test_set_get_delete() {
        let registry = StreamerRegistry::in_memory();
        registry.set(streamer(2)).unwrap();
        registry.set(streamer(1)).unwrap();

        assert!(registry.contains(1));
        assert_eq!(registry.name(2).as_deref(), Some("streamer2"));
        let uids: Vec<u64> = registry.list().iter().map(|s| s.uid).collect();
        assert_eq!(uids, vec![1, 2]);

        assert_eq!(registry.delete(1).unwrap().map(|s| s.uid), Some(1));
        assert!(registry.delete(1).unwrap().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_modify_removes_idle_record() {
        let registry = StreamerRegistry::with_streamers([streamer(1)]);
        let result = registry
            .modify(1, true, |s| s.notify.notify_on = false)
            .unwrap();
        assert!(result.is_some());
        assert!(!registry.contains(1));

        assert!(registry.modify(1, true, |_| ()).unwrap().is_none());
    }

    #[test]
    fn test_upsert_with_creates_once() {
        let registry = StreamerRegistry::in_memory();
        let first = registry
            .upsert_with(
                5,
                || Streamer::new(5, "five"),
                |s| !std::mem::replace(&mut s.danmu, true),
            )
            .unwrap();
        let second = registry
            .upsert_with(
                5,
                || Streamer::new(5, "five"),
                |s| !std::mem::replace(&mut s.danmu, true),
            )
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_diff() {
        let registry = StreamerRegistry::with_streamers([streamer(1), streamer(2)]);
        assert!(registry.take_diff().is_empty());

        registry.delete(1).unwrap();
        registry.set(streamer(3)).unwrap();
        registry.modify(2, false, |s| s.record = true).unwrap();

        let diff = registry.take_diff();
        assert_eq!(diff.added.iter().map(|s| s.uid).collect::<Vec<_>>(), vec![3]);
        assert_eq!(diff.removed.iter().map(|s| s.uid).collect::<Vec<_>>(), vec![1]);
        assert_eq!(diff.changed.iter().map(|s| s.uid).collect::<Vec<_>>(), vec![2]);

        assert!(registry.take_diff().is_empty());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");

        let registry = StreamerRegistry::open(&path).unwrap();
        assert!(registry.is_empty());
        registry.set(streamer(7)).unwrap();

        let reopened = StreamerRegistry::open(&path).unwrap();
        assert_eq!(reopened.get(7), Some(streamer(7)));
    }

    #[test]
    fn test_reload_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        let registry = StreamerRegistry::open(&path).unwrap();
        assert!(!registry.reload_if_changed().unwrap());

        // Make sure the new mtime differs on coarse-grained file systems.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let data = serde_json::to_string(&vec![streamer(9)]).unwrap();
        std::fs::write(&path, data).unwrap();
        let newer = SystemTime::now() + std::time::Duration::from_secs(2);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(newer).unwrap();

        assert!(registry.reload_if_changed().unwrap());
        assert!(registry.contains(9));
        assert_eq!(registry.take_diff().added.len(), 1);
    }
}
