//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the microphone capture path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Maximum milliseconds one blocking read waits for the next hardware
    /// buffer.  Also bounds how long a shutdown request can go unnoticed by
    /// the feed task.
    pub read_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

/// Settings for the wake-word detection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Wake-word model ids from the registry (e.g. `"alexa"`), or literal
    /// paths to `.rpw` files.  Their order fixes the `model_index` reported
    /// with each detection.
    pub models: Vec<String>,
    /// Detection score threshold (0.0 – 1.0).  Lower = more sensitive.
    pub threshold: f32,
    /// Milliseconds the detect task sleeps when no result is pending.
    pub backoff_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            models: vec!["alexa".into()],
            threshold: 0.5,
            backoff_ms: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use wake_listener::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Microphone capture settings.
    pub audio: AudioConfig,
    /// Wake-word detection settings.
    pub detector: DetectorConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet — first-run
    /// detection.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.audio.read_timeout_ms, loaded.audio.read_timeout_ms);
        assert_eq!(original.detector.models, loaded.detector.models);
        assert_eq!(original.detector.threshold, loaded.detector.threshold);
        assert_eq!(original.detector.backoff_ms, loaded.detector.backoff_ms);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.audio.read_timeout_ms, default.audio.read_timeout_ms);
        assert_eq!(config.detector.models, default.detector.models);
    }

    /// Verify the documented default values.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.read_timeout_ms, 100);
        assert_eq!(cfg.detector.models, vec!["alexa".to_string()]);
        assert_eq!(cfg.detector.threshold, 0.5);
        assert_eq!(cfg.detector.backoff_ms, 10);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.read_timeout_ms = 250;
        cfg.detector.models = vec!["ok-casa".into(), "computer".into()];
        cfg.detector.threshold = 0.35;
        cfg.detector.backoff_ms = 25;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.read_timeout_ms, 250);
        assert_eq!(
            loaded.detector.models,
            vec!["ok-casa".to_string(), "computer".to_string()]
        );
        assert_eq!(loaded.detector.threshold, 0.35);
        assert_eq!(loaded.detector.backoff_ms, 25);
    }

    /// A corrupt settings file must surface an error, not defaults.
    #[test]
    fn corrupt_file_errors() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is not { toml").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }
}
