use chrono::{DateTime, Utc};

use crate::record::{RecordMap, ReviewRecord};
use crate::schedule::{self, Difficulty};

const TITLE_LIMIT: usize = 50;
const FALLBACK_TITLE: &str = "Roadmap task";
const FALLBACK_DESCRIPTION: &str = "Review this concept to strengthen your understanding.";

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub title: String,
    pub description: String,
}

impl DisplayInfo {
    pub fn fallback() -> Self {
        DisplayInfo {
            title: FALLBACK_TITLE.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
        }
    }
}

/// Supplies presentation text for a task. Implemented by the roadmap catalog.
pub trait TaskLookup {
    fn label(&self, task_id: &str) -> Option<(String, String)>;

    fn display_info(&self, task_id: &str) -> DisplayInfo {
        match self.label(task_id) {
            Some((title, description)) => DisplayInfo {
                title: truncate_title(&title),
                description: if description.trim().is_empty() {
                    FALLBACK_DESCRIPTION.to_string()
                } else {
                    description
                },
            },
            None => DisplayInfo::fallback(),
        }
    }
}

/// Lookup for when no roadmap is loaded.
pub struct NoLookup;

impl TaskLookup for NoLookup {
    fn label(&self, _task_id: &str) -> Option<(String, String)> {
        None
    }
}

pub struct DueItem {
    pub task_id: String,
    pub info: DisplayInfo,
}

pub fn truncate_title(title: &str) -> String {
    let title = title.trim();
    if title.chars().count() > TITLE_LIMIT {
        let cut: String = title.chars().take(TITLE_LIMIT).collect();
        format!("{}...", cut.trim_end())
    } else {
        title.to_string()
    }
}

/// Creates a record for every completed task that doesn't have one yet.
/// Existing records are left untouched.
pub fn schedule_reviews<I, S>(
    completed: I,
    mut records: RecordMap,
    now: DateTime<Utc>,
) -> RecordMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for task_id in completed {
        let task_id = task_id.as_ref();
        if !records.contains_key(task_id) {
            tracing::debug!(task_id, "scheduling reviews");
            records.insert(task_id, ReviewRecord::new(now));
        }
    }
    records
}

/// Ids of every due record, in map order.
pub fn due_reviews(records: &RecordMap, now: DateTime<Utc>) -> Vec<String> {
    records
        .iter()
        .filter(|(_, record)| record.is_due(now))
        .map(|(id, _)| id.to_string())
        .collect()
}

pub fn due_items(
    records: &RecordMap,
    lookup: &dyn TaskLookup,
    now: DateTime<Utc>,
) -> Vec<DueItem> {
    due_reviews(records, now)
        .into_iter()
        .map(|task_id| DueItem {
            info: lookup.display_info(&task_id),
            task_id,
        })
        .collect()
}

/// Applies a rating. Unknown ids leave the map as it was.
pub fn record_review(
    mut records: RecordMap,
    task_id: &str,
    difficulty: Difficulty,
    now: DateTime<Utc>,
) -> RecordMap {
    let Some(record) = records.get_mut(task_id) else {
        tracing::debug!(task_id, "review for unknown task ignored");
        return records;
    };
    apply_review(record, difficulty, now);
    records
}

pub fn apply_review(record: &mut ReviewRecord, difficulty: Difficulty, now: DateTime<Utc>) {
    let outcome = schedule::review(record.review_count, record.strength, difficulty, now);
    record.review_count = outcome.review_count;
    record.strength = outcome.strength;
    record.next_review = Some(outcome.next_review);
}
