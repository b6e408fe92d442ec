use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::record::RecordMap;
use crate::streak::Streak;

pub const PROGRESS_KEY: &str = "roadmap_progress";
pub const RETENTION_KEY: &str = "roadmap_retention";
pub const STREAK_KEY: &str = "roadmap_streak";
pub const LAST_ACTIVE_KEY: &str = "last_active_date";

/// A pending write: the new value, or `None` to remove the key.
pub type Change = (String, Option<String>);

/// A string-to-string store in the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a batch of changes. Either all of them land or none do.
    fn apply(&mut self, changes: Vec<Change>) -> Result<()>;

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.apply(vec![(key.to_string(), Some(value))])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.apply(vec![(key.to_string(), None)])
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn apply(&mut self, changes: Vec<Change>) -> Result<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.values.insert(key, value),
                None => self.values.remove(&key),
            };
        }
        Ok(())
    }
}

/// All keys in one JSON file, rewritten in full on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Result<FileStore> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "data file is corrupt, starting empty"
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(FileStore { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn commit(&mut self, key: String, values: BTreeMap<String, String>) -> Result<()> {
        self.flush(&values).map_err(|e| Error::Storage {
            key,
            reason: e.to_string(),
        })?;
        self.values = values;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn apply(&mut self, changes: Vec<Change>) -> Result<()> {
        let mut values = self.values.clone();
        let mut keys = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            match value {
                Some(value) => {
                    values.insert(key.clone(), value);
                }
                None => {
                    values.remove(&key);
                }
            }
            keys.push(key);
        }
        if values == self.values {
            return Ok(());
        }
        self.commit(keys.join(", "), values)
    }
}

fn load_json<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    let Some(text) = store.get(key) else {
        return T::default();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "stored value is corrupt, treating as empty");
        T::default()
    })
}

fn encode_json<T: Serialize>(key: &str, value: &T) -> Result<Change> {
    let text = serde_json::to_string(value).map_err(|e| Error::Storage {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok((key.to_string(), Some(text)))
}

pub fn load_records(store: &dyn KeyValueStore) -> RecordMap {
    load_json(store, RETENTION_KEY)
}

pub fn records_change(records: &RecordMap) -> Result<Change> {
    encode_json(RETENTION_KEY, records)
}

pub fn save_records(store: &mut dyn KeyValueStore, records: &RecordMap) -> Result<()> {
    store.apply(vec![records_change(records)?])
}

pub fn load_progress(store: &dyn KeyValueStore) -> Progress {
    load_json(store, PROGRESS_KEY)
}

pub fn progress_change(progress: &Progress) -> Result<Change> {
    encode_json(PROGRESS_KEY, progress)
}

pub fn save_progress(store: &mut dyn KeyValueStore, progress: &Progress) -> Result<()> {
    store.apply(vec![progress_change(progress)?])
}

pub fn load_streak(store: &dyn KeyValueStore) -> Streak {
    let count = store
        .get(STREAK_KEY)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    let last_active = store
        .get(LAST_ACTIVE_KEY)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
    Streak { count, last_active }
}

/// The count and the last active day travel together.
pub fn streak_changes(streak: &Streak) -> Vec<Change> {
    vec![
        (STREAK_KEY.to_string(), Some(streak.count.to_string())),
        (
            LAST_ACTIVE_KEY.to_string(),
            streak.last_active.map(|day| day.format("%Y-%m-%d").to_string()),
        ),
    ]
}

pub fn save_streak(store: &mut dyn KeyValueStore, streak: &Streak) -> Result<()> {
    store.apply(streak_changes(streak))
}

/// Removals for every key the tracker owns.
pub fn clear_changes() -> Vec<Change> {
    [PROGRESS_KEY, RETENTION_KEY, STREAK_KEY, LAST_ACTIVE_KEY]
        .into_iter()
        .map(|key| (key.to_string(), None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review;
    use chrono::{TimeZone, Utc};

    #[test]
    fn missing_keys_load_empty() {
        let store = MemoryStore::new();
        assert!(load_records(&store).is_empty());
        assert!(load_progress(&store).is_empty());
        assert_eq!(load_streak(&store), Streak::default());
    }

    #[test]
    fn corrupt_records_load_empty() {
        let mut store = MemoryStore::new();
        store.set(RETENTION_KEY, "{\"t1\": {broken".into()).unwrap();
        assert!(load_records(&store).is_empty());
    }

    #[test]
    fn records_round_trip() {
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let records = review::schedule_reviews(["a", "b"], RecordMap::new(), t0);
        let mut store = MemoryStore::new();
        save_records(&mut store, &records).unwrap();
        assert_eq!(load_records(&store), records);
    }

    #[test]
    fn streak_round_trip() {
        let mut store = MemoryStore::new();
        let streak = Streak {
            count: 4,
            last_active: NaiveDate::from_ymd_opt(2025, 2, 3),
        };
        save_streak(&mut store, &streak).unwrap();
        assert_eq!(store.get(STREAK_KEY).as_deref(), Some("4"));
        assert_eq!(store.get(LAST_ACTIVE_KEY).as_deref(), Some("2025-02-03"));
        assert_eq!(load_streak(&store), streak);
    }

    #[test]
    fn unparsable_streak_reads_zero() {
        let mut store = MemoryStore::new();
        store.set(STREAK_KEY, "lots".into()).unwrap();
        assert_eq!(load_streak(&store).count, 0);
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.set(PROGRESS_KEY, "{\"a\":true}".into()).unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(PROGRESS_KEY).as_deref(), Some("{\"a\":true}"));
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(store.get(PROGRESS_KEY).is_none());
    }

    #[test]
    fn file_store_write_failure_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set(STREAK_KEY, "2".into()).unwrap();

        // A directory in place of the temp file makes the write fail.
        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        let err = store.set(STREAK_KEY, "3".into()).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert_eq!(store.get(STREAK_KEY).as_deref(), Some("2"));
    }

    #[test]
    fn file_store_batch_lands_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = FileStore::open(&path).unwrap();
        let streak = Streak {
            count: 3,
            last_active: NaiveDate::from_ymd_opt(2025, 2, 3),
        };
        save_streak(&mut store, &streak).unwrap();

        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        let mut changes = vec![progress_change(&Progress::from_iter([("a", true)])).unwrap()];
        changes.extend(streak_changes(&Streak::default()));
        let err = store.apply(changes).unwrap_err();
        match err {
            Error::Storage { key, .. } => assert!(key.contains(PROGRESS_KEY)),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.get(PROGRESS_KEY).is_none());
        assert_eq!(load_streak(&store), streak);

        std::fs::remove_dir(dir.path().join("state.json.tmp")).unwrap();
        store.apply(clear_changes()).unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(load_streak(&reopened), Streak::default());
    }

    #[test]
    fn removing_absent_key_skips_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = FileStore::open(&path).unwrap();
        store.remove(STREAK_KEY).unwrap();
        assert!(!path.exists());
    }
}
