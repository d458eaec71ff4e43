use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{env, ffi::OsString, fs, path::PathBuf, sync::RwLock};

use crate::{
    models::DEFAULT_IMAGE_DURATION_MS,
    view_state::{StoreOptions, DEFAULT_VIEW_TTL_HOURS, STORAGE_KEY},
    viewer::{
        state::{DEFAULT_VOLUME, PROGRESS_TICK_MS, WIDE_ASPECT_RATIO},
        ViewerOptions,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    pub loop_timeline: bool,
    pub default_image_duration_ms: u64,
    pub progress_tick_ms: u64,
    pub initial_volume: f32,
    pub wide_aspect_ratio: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loop_timeline: false,
            default_image_duration_ms: DEFAULT_IMAGE_DURATION_MS,
            progress_tick_ms: PROGRESS_TICK_MS,
            initial_volume: DEFAULT_VOLUME,
            wide_aspect_ratio: WIDE_ASPECT_RATIO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewStateSettings {
    pub storage_key: String,
    pub ttl_hours: i64,
}

impl Default for ViewStateSettings {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.into(),
            ttl_hours: DEFAULT_VIEW_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct UserSettings {
    playback: PlaybackSettings,
    view_state: ViewStateSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn playback(&self) -> PlaybackSettings {
        self.read().playback.clone()
    }

    pub fn view_state(&self) -> ViewStateSettings {
        self.read().view_state.clone()
    }

    pub fn viewer_options(&self) -> ViewerOptions {
        let playback = self.playback();
        ViewerOptions {
            loop_timeline: playback.loop_timeline,
            default_image_duration_ms: playback.default_image_duration_ms.max(1),
            tick_ms: playback.progress_tick_ms.max(1),
            initial_volume: playback.initial_volume.clamp(0.0, 1.0),
            wide_aspect_ratio: playback.wide_aspect_ratio,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        let view_state = self.view_state();
        StoreOptions {
            storage_key: view_state.storage_key,
            ttl: Duration::hours(view_state.ttl_hours.max(0)),
        }
    }

    /// Writes the current settings out so a first run leaves an editable file behind.
    pub fn save_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.persist(&self.read())?;
        Ok(true)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub const DATA_DIR_ENV: &str = "REELVIEW_DATA_DIR";
pub const DEBUG_ENV: &str = "REELVIEW_DEBUG";
pub const SETTINGS_FILE: &str = "settings.json";
pub const VIEW_STATE_FILE: &str = "view_state.json";

/// `REELVIEW_DATA_DIR` if set and non-empty, otherwise `.reelview` under the working directory.
pub fn data_dir() -> PathBuf {
    resolve_data_dir(env::var_os(DATA_DIR_ENV))
}

fn resolve_data_dir(value: Option<OsString>) -> PathBuf {
    match value {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(".reelview"),
    }
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}
