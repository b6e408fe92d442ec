use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Persisting state failed. The in-memory state was left as it was.
    #[error("failed to save {key}: {reason}")]
    Storage { key: String, reason: String },

    #[error("unknown difficulty: {0} (expected easy, medium or hard)")]
    UnknownDifficulty(String),

    #[error("import failed: {0}")]
    Import(String),

    #[error("invalid quiz question on line {line}: {reason}")]
    InvalidQuestion { line: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = Error::Storage {
            key: "roadmap_retention".into(),
            reason: "disk full".into(),
        };
        assert_eq!(err.to_string(), "failed to save roadmap_retention: disk full");
    }

    #[test]
    fn json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
