//! Configuration store
//!
//! Durable key-value settings backed by a JSON document in a per-user
//! config directory. Defaults are overlaid by whatever persisted keys are
//! valid; a corrupt or unreadable file is logged and ignored, never fatal.
//! Setters write through to disk immediately; persistence is best-effort
//! (a failed write is logged, the in-memory value stays authoritative).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

pub const KEY_SAVE_PATH: &str = "save_path";
pub const KEY_PORT: &str = "port";
pub const KEY_AUTO_START: &str = "auto_start";

const CONFIG_FILE: &str = "config.json";
const APP_DIR: &str = "video-inbox";
const SAVE_SUBDIR: &str = "VideoInbox";

pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Load configuration from `config_dir` (or the per-user default
    /// location), falling back to built-in defaults on any read or parse
    /// failure. Unknown keys in the persisted document are preserved and
    /// round-trip through [`persist`](Self::persist).
    pub fn load(config_dir: Option<&Path>) -> Self {
        let dir = config_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_dir);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create config directory");
        }
        let path = dir.join(CONFIG_FILE);

        let mut values = defaults();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                    Ok(persisted) => {
                        for (key, value) in persisted {
                            values.insert(key, value);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "config is not valid JSON, using defaults");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                }
            }
        }

        Self { path, values }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a key and write the full document through to disk.
    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
        self.persist();
    }

    /// Serialize the full config map to the backing file.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist config");
        }
    }

    fn try_persist(&self) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Directory completed uploads are saved to.
    pub fn save_path(&self) -> PathBuf {
        self.values
            .get(KEY_SAVE_PATH)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(default_save_path)
    }

    pub fn set_save_path(&mut self, path: &Path) {
        self.set(KEY_SAVE_PATH, Value::from(path.display().to_string()));
    }

    /// Listening port; a persisted value outside 1-65535 is ignored.
    pub fn port(&self) -> u16 {
        self.values
            .get(KEY_PORT)
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn set_port(&mut self, port: u16) {
        self.set(KEY_PORT, Value::from(port));
    }

    /// Whether the shell should start the service at launch.
    pub fn auto_start(&self) -> bool {
        self.values
            .get(KEY_AUTO_START)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn set_auto_start(&mut self, auto_start: bool) {
        self.set(KEY_AUTO_START, Value::from(auto_start));
    }
}

fn defaults() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        KEY_SAVE_PATH.to_string(),
        Value::from(default_save_path().display().to_string()),
    );
    map.insert(KEY_PORT.to_string(), Value::from(DEFAULT_PORT));
    map.insert(KEY_AUTO_START.to_string(), Value::from(true));
    map
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_save_path() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SAVE_SUBDIR)
}
