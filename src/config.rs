use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;

/// Settings shared by every command, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub roadmap: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn new(data_path: Option<PathBuf>, roadmap: Vec<String>, log_level: &str) -> Config {
        Config {
            data_path: data_path.unwrap_or_else(default_data_path),
            roadmap,
            log_level: log_level.to_ascii_lowercase(),
        }
    }

    /// Filter directive for the log subscriber. `RUST_LOG` wins when set.
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("rehearse={}", self.log_level))
    }
}

/// `$XDG_DATA_HOME/rehearse/state.json` or the platform equivalent.
pub fn default_data_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rehearse")
        .join("state.json")
}
