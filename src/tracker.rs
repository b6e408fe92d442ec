use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::export::ExportBundle;
use crate::progress::{self, Progress, ProgressSummary};
use crate::record::RecordMap;
use crate::review::{self, DueItem, TaskLookup};
use crate::schedule::Difficulty;
use crate::store::{self, KeyValueStore};
use crate::streak::Streak;

/// Owns the in-memory state and the store behind it.
///
/// Every mutating method builds the new state, writes it to the store and
/// only then replaces the in-memory copy, so a failed write leaves the
/// tracker as it was.
pub struct Tracker<S> {
    store: S,
    progress: Progress,
    records: RecordMap,
    streak: Streak,
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn open(store: S) -> Self {
        let progress = store::load_progress(&store);
        let records = store::load_records(&store);
        let streak = store::load_streak(&store);
        tracing::debug!(
            tasks = progress.len(),
            records = records.len(),
            streak = streak.count,
            "tracker opened"
        );
        Tracker {
            store,
            progress,
            records,
            streak,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn records(&self) -> &RecordMap {
        &self.records
    }

    pub fn streak(&self) -> Streak {
        self.streak
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.progress.get(task_id).copied().unwrap_or(false)
    }

    /// Marks tasks done or not done. Newly completed tasks get review records;
    /// unchecking keeps the record.
    pub fn set_completed<I, T>(
        &mut self,
        task_ids: I,
        done: bool,
        now: DateTime<Utc>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut progress = self.progress.clone();
        for id in task_ids {
            progress.insert(id.as_ref(), done);
        }
        let records = review::schedule_reviews(
            progress::completed_tasks(&progress),
            self.records.clone(),
            now,
        );

        let mut changes = vec![store::progress_change(&progress)?];
        if records != self.records {
            changes.push(store::records_change(&records)?);
        }
        self.store.apply(changes)?;
        self.progress = progress;
        self.records = records;
        Ok(())
    }

    pub fn toggle(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let done = !self.is_completed(task_id);
        self.set_completed([task_id], done, now)?;
        Ok(done)
    }

    pub fn due(&self, now: DateTime<Utc>) -> Vec<String> {
        review::due_reviews(&self.records, now)
    }

    pub fn due_items(&self, lookup: &dyn TaskLookup, now: DateTime<Utc>) -> Vec<DueItem> {
        review::due_items(&self.records, lookup, now)
    }

    /// Returns `false` when the task has no review record.
    pub fn record_review(
        &mut self,
        task_id: &str,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !self.records.contains_key(task_id) {
            return Ok(false);
        }
        let records = review::record_review(self.records.clone(), task_id, difficulty, now);
        store::save_records(&mut self.store, &records)?;
        self.records = records;
        tracing::info!(task_id, difficulty = difficulty.as_str(), "review recorded");
        Ok(true)
    }

    pub fn check_in(&mut self, today: NaiveDate) -> Result<Streak> {
        let streak = self.streak.check_in(today);
        if streak != self.streak {
            store::save_streak(&mut self.store, &streak)?;
            self.streak = streak;
        }
        Ok(self.streak)
    }

    /// `total` is the roadmap size when one is loaded.
    pub fn summary(&self, total: Option<usize>) -> ProgressSummary {
        progress::summary(&self.progress, total.unwrap_or(self.progress.len()))
    }

    pub fn export(&self, now: DateTime<Utc>) -> ExportBundle {
        ExportBundle {
            progress: Some(self.progress.clone()),
            retention: Some(self.records.clone()),
            streak: Some(self.streak.count),
            export_date: Some(now),
        }
    }

    /// Replaces whatever the bundle carries in a single write.
    pub fn import(&mut self, bundle: ExportBundle) -> Result<()> {
        let streak = bundle.streak.filter(|&count| count > 0).map(|count| Streak {
            count,
            last_active: self.streak.last_active,
        });

        let mut changes = Vec::new();
        if let Some(progress) = &bundle.progress {
            changes.push(store::progress_change(progress)?);
        }
        if let Some(records) = &bundle.retention {
            changes.push(store::records_change(records)?);
        }
        if let Some(streak) = &streak {
            changes.extend(store::streak_changes(streak));
        }
        if !changes.is_empty() {
            self.store.apply(changes)?;
        }

        if let Some(progress) = bundle.progress {
            self.progress = progress;
        }
        if let Some(records) = bundle.retention {
            self.records = records;
        }
        if let Some(streak) = streak {
            self.streak = streak;
        }
        tracing::info!(
            tasks = self.progress.len(),
            records = self.records.len(),
            "data imported"
        );
        Ok(())
    }

    /// Drops all progress, review records and the streak.
    pub fn reset(&mut self) -> Result<()> {
        self.store.apply(store::clear_changes())?;
        self.progress = Progress::new();
        self.records = RecordMap::new();
        self.streak = Streak::default();
        tracing::info!("all data reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use chrono::{Days, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, 10, 0, 0).unwrap()
    }

    /// Store whose writes can be switched off, for every key or just one.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: bool,
        fail_key: Option<&'static str>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn apply(&mut self, changes: Vec<store::Change>) -> Result<()> {
            let failing = changes.iter().find(|(key, value)| {
                value.is_some() && (self.fail || self.fail_key == Some(key.as_str()))
            });
            if let Some((key, _)) = failing {
                return Err(Error::Storage {
                    key: key.clone(),
                    reason: "quota exceeded".into(),
                });
            }
            self.inner.apply(changes)
        }
    }

    #[test]
    fn completing_schedules_and_persists() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["t1", "t2"], true, t0()).unwrap();
        assert!(tracker.is_completed("t1"));
        assert_eq!(tracker.records().len(), 2);

        let reopened = Tracker::open(tracker.store);
        assert_eq!(reopened.records().len(), 2);
        assert!(reopened.is_completed("t2"));
    }

    #[test]
    fn unchecking_keeps_record() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["t1"], true, t0()).unwrap();
        let done = tracker.toggle("t1", t0()).unwrap();
        assert!(!done);
        assert!(!tracker.is_completed("t1"));
        assert!(tracker.records().contains_key("t1"));
    }

    #[test]
    fn recompleting_does_not_reset_record() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["t1"], true, t0()).unwrap();
        tracker
            .record_review("t1", Difficulty::Easy, t0() + Days::new(1))
            .unwrap();
        let before = tracker.records().get("t1").cloned();
        tracker.toggle("t1", t0() + Days::new(2)).unwrap();
        tracker.toggle("t1", t0() + Days::new(2)).unwrap();
        assert_eq!(tracker.records().get("t1").cloned(), before);
    }

    #[test]
    fn review_flow() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["t1"], true, t0()).unwrap();
        let now = t0() + Days::new(1);
        assert_eq!(tracker.due(now), vec!["t1"]);
        assert!(tracker.record_review("t1", Difficulty::Easy, now).unwrap());
        assert!(tracker.due(now).is_empty());
        assert!(!tracker.record_review("nope", Difficulty::Easy, now).unwrap());
    }

    #[test]
    fn failed_write_leaves_state_unchanged() {
        let mut tracker = Tracker::open(FlakyStore::default());
        tracker.set_completed(["t1"], true, t0()).unwrap();
        let records = tracker.records().clone();
        let progress = tracker.progress().clone();

        tracker.store.fail = true;
        let now = t0() + Days::new(1);
        assert!(tracker.record_review("t1", Difficulty::Easy, now).is_err());
        assert!(tracker.set_completed(["t2"], true, now).is_err());
        assert_eq!(tracker.records(), &records);
        assert_eq!(tracker.progress(), &progress);
    }

    #[test]
    fn failed_import_keeps_every_field() {
        let mut tracker = Tracker::open(FlakyStore {
            fail_key: Some(store::RETENTION_KEY),
            ..Default::default()
        });
        let bundle = ExportBundle {
            progress: Some(Progress::from_iter([("x", true)])),
            retention: Some(review::schedule_reviews(["x"], RecordMap::new(), t0())),
            streak: Some(4),
            export_date: None,
        };
        let err = tracker.import(bundle).unwrap_err();
        assert!(matches!(err, Error::Storage { ref key, .. } if key == store::RETENTION_KEY));
        assert!(tracker.progress().is_empty());
        assert!(tracker.records().is_empty());
        assert_eq!(tracker.streak(), Streak::default());

        let reopened = Tracker::open(tracker.store);
        assert!(reopened.progress().is_empty());
        assert_eq!(reopened.streak().count, 0);
    }

    #[test]
    fn failed_completion_writes_neither_key() {
        let mut tracker = Tracker::open(FlakyStore {
            fail_key: Some(store::RETENTION_KEY),
            ..Default::default()
        });
        assert!(tracker.set_completed(["t1"], true, t0()).is_err());
        assert!(!tracker.is_completed("t1"));
        assert!(tracker.store().get(store::PROGRESS_KEY).is_none());
    }

    #[test]
    fn streak_check_in_persists() {
        let mut tracker = Tracker::open(MemoryStore::new());
        let day = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        tracker.check_in(day).unwrap();
        let streak = tracker.check_in(day.succ_opt().unwrap()).unwrap();
        assert_eq!(streak.count, 2);
        assert_eq!(Tracker::open(tracker.store).streak(), streak);
    }

    #[test]
    fn summary_uses_roadmap_total() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["a", "b"], true, t0()).unwrap();
        tracker.set_completed(["c"], false, t0()).unwrap();
        assert_eq!(tracker.summary(None).percentage, 67);
        assert_eq!(tracker.summary(Some(10)).percentage, 20);
    }

    #[test]
    fn export_import_round_trip() {
        let mut source = Tracker::open(MemoryStore::new());
        source.set_completed(["a", "b"], true, t0()).unwrap();
        source
            .record_review("a", Difficulty::Hard, t0() + Days::new(1))
            .unwrap();
        source
            .check_in(NaiveDate::from_ymd_opt(2025, 5, 5).unwrap())
            .unwrap();
        let json = source.export(t0()).to_json().unwrap();

        let mut target = Tracker::open(MemoryStore::new());
        target.import(ExportBundle::from_json(&json).unwrap()).unwrap();
        assert_eq!(target.progress(), source.progress());
        assert_eq!(target.records(), source.records());
        assert_eq!(target.streak().count, 1);
    }

    #[test]
    fn import_only_replaces_present_fields() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["a"], true, t0()).unwrap();
        tracker
            .import(ExportBundle {
                streak: Some(9),
                ..Default::default()
            })
            .unwrap();
        assert!(tracker.is_completed("a"));
        assert_eq!(tracker.streak().count, 9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = Tracker::open(MemoryStore::new());
        tracker.set_completed(["a"], true, t0()).unwrap();
        tracker.reset().unwrap();
        assert!(tracker.progress().is_empty());
        assert!(tracker.records().is_empty());
        let reopened = Tracker::open(tracker.store);
        assert!(reopened.records().is_empty());
    }
}
