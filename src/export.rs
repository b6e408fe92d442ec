use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::record::RecordMap;

/// Everything the tracker persists, as one portable JSON document.
///
/// Every field is optional on import; only the fields present replace
/// the current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<RecordMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
}

impl ExportBundle {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<ExportBundle> {
        serde_json::from_str(text)
            .map_err(|e| Error::Import(format!("please check the file format ({e})")))
    }
}

pub fn file_name(today: NaiveDate) -> String {
    format!("roadmap_progress_{}.json", today.format("%Y-%m-%d"))
}
