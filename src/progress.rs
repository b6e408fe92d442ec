use crate::ordered::OrderedMap;

/// Checkbox state per task id.
pub type Progress = OrderedMap<bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
    pub retention_score: u32,
}

pub fn completed_tasks(progress: &Progress) -> Vec<String> {
    progress
        .iter()
        .filter(|(_, done)| **done)
        .map(|(id, _)| id.to_string())
        .collect()
}

pub fn summary(progress: &Progress, total: usize) -> ProgressSummary {
    let completed = progress.iter().filter(|(_, done)| **done).count();
    let percentage = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };
    ProgressSummary {
        total,
        completed,
        percentage,
        retention_score: percentage.saturating_sub(10),
    }
}
