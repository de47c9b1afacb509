//! Persisted settings and the repository that stores them

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::QuickSendList;
use crate::core::{TrimPolicy, DEFAULT_BATCH_LINES, DEFAULT_MAX_LINES};
use crate::protocol::{ChecksumEndMode, ChecksumSpec};
use crate::serial::{DataBits, Parity, PortParams, StopBits};

const SETTINGS_FILE: &str = "settings.json";
const QUICK_SENDS_FILE: &str = "quick_sends.json";
const APP_DIR: &str = "serial-monitor";

/// Application settings, stored as one flat JSON object.
///
/// Every key is optional on load; missing keys take the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Opaque window geometry blob, kept for the UI
    pub geometry: Option<String>,
    pub language: String,
    pub theme_index: u32,

    pub baudrate: u32,
    pub parity: Parity,
    pub databits: DataBits,
    pub stopbits: StopBits,

    pub receive_hex_mode: bool,
    pub send_hex_mode: bool,
    pub auto_scroll: bool,
    pub show_timestamp: bool,
    pub enable_ansi_colors: bool,
    pub auto_reconnect: bool,

    pub auto_checksum: bool,
    pub checksum_start: usize,
    pub checksum_end_mode: ChecksumEndMode,

    pub dtr_state: bool,
    pub rts_state: bool,

    pub trim_enabled: bool,
    pub max_terminal_lines: usize,
    pub trim_batch_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geometry: None,
            language: "zh".to_string(),
            theme_index: 0,
            baudrate: 115_200,
            parity: Parity::None,
            databits: DataBits::Eight,
            stopbits: StopBits::One,
            receive_hex_mode: false,
            send_hex_mode: false,
            auto_scroll: true,
            show_timestamp: true,
            enable_ansi_colors: true,
            auto_reconnect: false,
            auto_checksum: false,
            checksum_start: 1,
            checksum_end_mode: ChecksumEndMode::None,
            dtr_state: false,
            rts_state: false,
            trim_enabled: true,
            max_terminal_lines: DEFAULT_MAX_LINES,
            trim_batch_lines: DEFAULT_BATCH_LINES,
        }
    }
}

impl Settings {
    pub fn port_params(&self) -> PortParams {
        PortParams {
            baud_rate: self.baudrate,
            parity: self.parity,
            data_bits: self.databits,
            stop_bits: self.stopbits,
        }
    }

    pub fn set_port_params(&mut self, params: PortParams) {
        self.baudrate = params.baud_rate;
        self.parity = params.parity;
        self.databits = params.data_bits;
        self.stopbits = params.stop_bits;
    }

    pub fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy::new(
            self.trim_enabled,
            self.max_terminal_lines,
            self.trim_batch_lines,
        )
    }

    /// Checksum for the main send box, if enabled
    pub fn checksum_spec(&self) -> Option<ChecksumSpec> {
        self.auto_checksum.then(|| ChecksumSpec {
            start: self.checksum_start.max(1),
            end_mode: self.checksum_end_mode,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings and quick-send list stored as JSON files in one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRepository {
    dir: PathBuf,
}

impl SettingsRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config dir>/serial-monitor`, or `./config` when the platform has no
    /// config directory
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("config"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn quick_sends_path(&self) -> PathBuf {
        self.dir.join(QUICK_SENDS_FILE)
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    ///
    /// A key whose value does not fit (say `"databits": 12`) takes its
    /// default; the other stored keys still apply.
    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        if !path.exists() {
            return Settings::default();
        }
        match load_json::<Value>(&path) {
            Ok(Value::Object(stored)) => merge_settings(stored, &path),
            Ok(_) => {
                tracing::warn!("Ignoring {}: not a JSON object", path.display());
                Settings::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError> {
        save_json(&self.dir, &self.settings_path(), settings)
    }

    pub fn load_quick_sends(&self) -> QuickSendList {
        load_or_default(&self.quick_sends_path())
    }

    pub fn save_quick_sends(&self, list: &QuickSendList) -> Result<(), ConfigError> {
        save_json(&self.dir, &self.quick_sends_path(), list)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Lay stored keys over the defaults one at a time, skipping any key that
/// makes the record fail to deserialize
fn merge_settings(stored: Map<String, Value>, path: &Path) -> Settings {
    let mut merged = match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(defaults)) => defaults,
        _ => return Settings::default(),
    };

    for (key, value) in stored {
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<Settings>(Value::Object(candidate)) {
            Ok(_) => {
                merged.insert(key, value);
            }
            Err(e) => {
                tracing::warn!("Ignoring setting '{}' in {}: {}", key, path.display(), e);
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match load_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn save_json<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<(), ConfigError> {
    std::fs::create_dir_all(dir)?;
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    tracing::debug!("Saved {}", path.display());
    Ok(())
}
