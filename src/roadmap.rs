use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::review::TaskLookup;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Task {
    pub phase: String,
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Tasks loaded from one or more roadmap CSV files, in file order.
#[derive(Debug, Default)]
pub struct Catalog {
    pub tasks: Vec<Task>,
    pub sources: Vec<PathBuf>,
}

impl Catalog {
    /// Loads every roadmap file found under `paths`. Files with blank ids are
    /// written back with the generated ids so progress stays attached.
    pub fn load(paths: &[String]) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        for file in discover_files(paths) {
            let (tasks, generated) = load_csv(&file)?;
            if generated > 0 {
                tracing::info!(
                    file = %file.display(),
                    generated,
                    "assigned ids to roadmap tasks"
                );
                save_csv(&file, &tasks)?;
            }
            for task in tasks {
                catalog.sources.push(file.clone());
                catalog.tasks.push(task);
            }
        }
        tracing::debug!(tasks = catalog.tasks.len(), "roadmap loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Distinct phase names, in first-seen order.
    pub fn phases(&self) -> Vec<&str> {
        let mut phases: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !phases.contains(&task.phase.as_str()) {
                phases.push(&task.phase);
            }
        }
        phases
    }
}

impl TaskLookup for Catalog {
    fn label(&self, task_id: &str) -> Option<(String, String)> {
        self.get(task_id)
            .map(|t| (t.title.clone(), t.description.clone()))
    }
}

pub(crate) fn get_field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

/// Returns the tasks and how many of them needed a generated id.
pub fn load_csv(path: &Path) -> Result<(Vec<Task>, usize)> {
    let default_phase = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("roadmap")
        .to_string();

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let mut tasks = Vec::new();
    let mut generated = 0;
    for result in reader.records() {
        let record = result?;

        let title = get_field(&record, 2);
        if title.is_empty() {
            continue;
        }

        let phase_raw = get_field(&record, 0);
        let phase = if phase_raw.is_empty() {
            default_phase.clone()
        } else {
            phase_raw
        };

        let id_raw = get_field(&record, 1);
        let id = if id_raw.is_empty() {
            generated += 1;
            uuid::Uuid::new_v4().to_string()
        } else {
            id_raw
        };

        tasks.push(Task {
            phase,
            id,
            title,
            description: get_field(&record, 3),
        });
    }
    Ok((tasks, generated))
}

pub fn save_csv(path: &Path, tasks: &[Task]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["phase", "id", "title", "description"])?;
    for task in tasks {
        writer.write_record([&task.phase, &task.id, &task.title, &task.description])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn discover_files(paths: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for p in paths {
        let path = PathBuf::from(p);
        if path.is_dir() {
            collect_csv_recursive(&path, &mut files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    files
}

fn collect_csv_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot read roadmap directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_csv_recursive(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
}
