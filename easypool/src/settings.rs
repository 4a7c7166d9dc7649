// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::mutex::Mutex;

const DEFAULT_POOL_SIZE: usize = 10;
const DEFAULT_THINNING_CHECK_INTERVAL_SECS: f64 = 5.0;
const DEFAULT_MAX_THIN_PER_TICK: usize = 5;

/// Settings shared by every pool of a [`Registry`](crate::Registry).
///
/// All fields are live-tunable: pools read them on every operation that needs them.
///
/// Fields missing from a serialized form fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct PoolingSettings {
    /// Target size of a pool created without an explicit count.
    pub default_pool_size: usize,

    /// Seconds between two thinning checks of a pool.
    pub thinning_check_interval_secs: f64,

    /// Maximum number of idle entries a single thinning check may destroy.
    pub max_thin_per_tick: usize,

    /// Whether a host with an object hierarchy should display the pools.
    ///
    /// The pools themselves never read this flag.
    pub show_pools_in_hierarchy: bool,
}

impl Default for PoolingSettings {
    fn default() -> Self {
        Self {
            default_pool_size: DEFAULT_POOL_SIZE,
            thinning_check_interval_secs: DEFAULT_THINNING_CHECK_INTERVAL_SECS,
            max_thin_per_tick: DEFAULT_MAX_THIN_PER_TICK,
            show_pools_in_hierarchy: true,
        }
    }
}

/// The error returned when settings cannot be read or written.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot access pooling settings at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed pooling settings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PoolingSettings {
    /// Returns a new [`PoolingSettings`] with the specified default pool size.
    pub fn with_default_pool_size(mut self, default_pool_size: usize) -> Self {
        self.default_pool_size = default_pool_size;
        self
    }

    /// Returns a new [`PoolingSettings`] with the specified thinning check interval.
    pub fn with_thinning_check_interval(mut self, interval: Duration) -> Self {
        self.thinning_check_interval_secs = interval.as_secs_f64();
        self
    }

    /// Returns a new [`PoolingSettings`] with the specified thinning rate limit.
    pub fn with_max_thin_per_tick(mut self, max_thin_per_tick: usize) -> Self {
        self.max_thin_per_tick = max_thin_per_tick;
        self
    }

    /// The interval between two thinning checks.
    ///
    /// A negative, zero or non-finite value in the settings yields the default interval.
    pub fn thinning_check_interval(&self) -> Duration {
        match Duration::try_from_secs_f64(self.thinning_check_interval_secs) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => Duration::from_secs_f64(DEFAULT_THINNING_CHECK_INTERVAL_SECS),
        }
    }

    /// Restores every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parses settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reads settings from a JSON file, falling back to the defaults if the file is missing or
    /// malformed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::try_load(path).unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to default pooling settings");
            Self::default()
        })
    }

    /// Reads settings from a JSON file, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::try_load(path);
        }

        let settings = Self::default();
        settings.save(path)?;
        tracing::info!(path = %path.display(), "created default pooling settings");
        Ok(settings)
    }

    /// Writes settings to a JSON file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let io_err = |source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)
    }
}

pub(crate) type SharedSettings = Arc<Mutex<PoolingSettings>>;

pub(crate) fn shared(settings: PoolingSettings) -> SharedSettings {
    Arc::new(Mutex::new(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PoolingSettings::default();
        assert_eq!(settings.default_pool_size, 10);
        assert_eq!(settings.thinning_check_interval(), Duration::from_secs(5));
        assert_eq!(settings.max_thin_per_tick, 5);
        assert!(settings.show_pools_in_hierarchy);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = PoolingSettings::from_json(r#"{ "max_thin_per_tick": 2 }"#).unwrap();
        assert_eq!(settings.max_thin_per_tick, 2);
        assert_eq!(settings.default_pool_size, 10);
        assert_eq!(settings.thinning_check_interval_secs, 5.0);
    }

    #[test]
    fn test_invalid_interval_falls_back() {
        let mut settings = PoolingSettings::default();
        settings.thinning_check_interval_secs = -1.0;
        assert_eq!(settings.thinning_check_interval(), Duration::from_secs(5));
        settings.thinning_check_interval_secs = 0.0;
        assert_eq!(settings.thinning_check_interval(), Duration::from_secs(5));
        settings.thinning_check_interval_secs = 0.5;
        assert_eq!(settings.thinning_check_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_reset() {
        let mut settings = PoolingSettings::default()
            .with_default_pool_size(3)
            .with_max_thin_per_tick(1);
        settings.show_pools_in_hierarchy = false;
        settings.reset();
        assert_eq!(settings, PoolingSettings::default());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            PoolingSettings::try_load(&path),
            Err(SettingsError::Io { .. })
        ));
        assert_eq!(PoolingSettings::load(&path), PoolingSettings::default());
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PoolingSettings::try_load(&path),
            Err(SettingsError::Parse(_))
        ));
        assert_eq!(PoolingSettings::load(&path), PoolingSettings::default());
    }

    #[test]
    fn test_load_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("easypool").join("settings.json");

        let created = PoolingSettings::load_or_create(&path).unwrap();
        assert_eq!(created, PoolingSettings::default());
        assert!(path.exists());

        PoolingSettings::default()
            .with_default_pool_size(4)
            .save(&path)
            .unwrap();
        let loaded = PoolingSettings::load_or_create(&path).unwrap();
        assert_eq!(loaded.default_pool_size, 4);
    }
}
