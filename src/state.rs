// src/state.rs
//! Harness-owned persisted state: one cursor per adapter plus the
//! replay log of notification keys already sent. The cursor write at
//! the end of a successful cycle is the single commit point of the
//! whole pipeline; everything else is reconstructed by re-polling.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How many dispatched keys we remember per adapter. A retried cycle
/// only ever replays the most recent range, so a short tail suffices.
const REPLAY_KEEP: usize = 512;

/// Last position successfully processed, keyed by adapter id. Read at
/// the start of every cycle; written exactly once at the end of a
/// successful one.
pub trait CursorStore: Send + Sync {
    fn load(&self, adapter_id: &str) -> Result<Option<String>>;
    fn store(&self, adapter_id: &str, cursor: &str) -> Result<()>;
}

/// Replay protection for dispatch: keys of notifications already sent,
/// so a retried cycle does not re-notify what went out before the
/// failure.
pub trait ReplayLog: Send + Sync {
    fn seen(&self, adapter_id: &str, key: &str) -> bool;
    fn record(&self, adapter_id: &str, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AdapterState {
    cursor: Option<String>,
    #[serde(default)]
    sent: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    adapters: HashMap<String, AdapterState>,
}

impl StateFile {
    fn entry(&mut self, adapter_id: &str) -> &mut AdapterState {
        self.adapters.entry(adapter_id.to_string()).or_default()
    }
}

/// In-memory store for tests and dry runs. Cursors do not survive the
/// process, which is exactly the cold-start behavior under test.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<StateFile>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryStateStore {
    fn load(&self, adapter_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().expect("state lock");
        Ok(inner.adapters.get(adapter_id).and_then(|a| a.cursor.clone()))
    }

    fn store(&self, adapter_id: &str, cursor: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("state lock");
        inner.entry(adapter_id).cursor = Some(cursor.to_string());
        Ok(())
    }
}

impl ReplayLog for MemoryStateStore {
    fn seen(&self, adapter_id: &str, key: &str) -> bool {
        let inner = self.inner.lock().expect("state lock");
        inner
            .adapters
            .get(adapter_id)
            .is_some_and(|a| a.sent.iter().any(|k| k == key))
    }

    fn record(&self, adapter_id: &str, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("state lock");
        push_sent(&mut inner.entry(adapter_id).sent, key);
        Ok(())
    }
}

/// JSON file under `state/`, loaded once and rewritten atomically
/// (tmp + rename) on every mutation. Mutations are rare: one cursor
/// write per cycle, one record per notification.
pub struct FileStateStore {
    path: PathBuf,
    inner: Mutex<StateFile>,
}

impl FileStateStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt state file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading state {}", path.display()))
            }
        };
        Ok(Self {
            path,
            inner: Mutex::new(state),
        })
    }

    fn persist(&self, state: &StateFile) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating state dir {}", dir.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(state).context("serializing state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("committing {}", self.path.display()))?;
        Ok(())
    }
}

impl CursorStore for FileStateStore {
    fn load(&self, adapter_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().expect("state lock");
        Ok(inner.adapters.get(adapter_id).and_then(|a| a.cursor.clone()))
    }

    fn store(&self, adapter_id: &str, cursor: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("state lock");
        inner.entry(adapter_id).cursor = Some(cursor.to_string());
        self.persist(&inner)
    }
}

impl ReplayLog for FileStateStore {
    fn seen(&self, adapter_id: &str, key: &str) -> bool {
        let inner = self.inner.lock().expect("state lock");
        inner
            .adapters
            .get(adapter_id)
            .is_some_and(|a| a.sent.iter().any(|k| k == key))
    }

    fn record(&self, adapter_id: &str, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("state lock");
        push_sent(&mut inner.entry(adapter_id).sent, key);
        self.persist(&inner)
    }
}

fn push_sent(sent: &mut Vec<String>, key: &str) {
    if sent.iter().any(|k| k == key) {
        return;
    }
    sent.push(key.to_string());
    if sent.len() > REPLAY_KEEP {
        let overflow = sent.len() - REPLAY_KEEP;
        sent.drain(..overflow);
    }
}

/// Convenience for naming a state file under a directory the way the
/// rest of the repo expects it.
pub fn default_state_path() -> &'static Path {
    Path::new("state/listening.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_cursor() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load("hn").unwrap(), None);
        store.store("hn", "100").unwrap();
        assert_eq!(store.load("hn").unwrap(), Some("100".to_string()));
    }

    #[test]
    fn adapters_do_not_share_cursors() {
        let store = MemoryStateStore::new();
        store.store("reddit_posts", "t3_a").unwrap();
        store.store("reddit_comments", "t1_b").unwrap();
        assert_eq!(store.load("reddit_posts").unwrap().as_deref(), Some("t3_a"));
        assert_eq!(
            store.load("reddit_comments").unwrap().as_deref(),
            Some("t1_b")
        );
    }

    #[test]
    fn replay_log_caps_its_tail() {
        let store = MemoryStateStore::new();
        for i in 0..(REPLAY_KEEP + 10) {
            store.record("hn", &i.to_string()).unwrap();
        }
        assert!(!store.seen("hn", "0"));
        assert!(store.seen("hn", &(REPLAY_KEEP + 9).to_string()));
    }
}
