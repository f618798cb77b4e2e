//! Wake-word model registry, metadata and path resolution.
//!
//! [`COMMUNITY_WAKEWORDS`] lists the known community-trained rustpotter
//! models (`.rpw` files).  [`ModelPaths`] resolves their on-disk location
//! from an [`crate::config::AppPaths`] instance; entries a user has not
//! downloaded are simply skipped at startup.

use std::path::PathBuf;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// WakewordInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single wake-word model file.
#[derive(Debug)]
pub struct WakewordInfo {
    /// Unique identifier used in `DetectorConfig::models` (e.g. `"alexa"`).
    pub id: &'static str,
    /// Human-readable name, shown in logs at startup.
    pub display_name: &'static str,
    /// File name under the models directory (e.g. `"alexa.rpw"`).
    pub file_name: &'static str,
    /// Language the model was trained on as an ISO-639-1 code.
    pub language: &'static str,
    /// Where the model file can be obtained.
    pub source_url: &'static str,
}

// ---------------------------------------------------------------------------
// Community wakewords
// ---------------------------------------------------------------------------

/// Community-trained rustpotter models.
pub const COMMUNITY_WAKEWORDS: &[WakewordInfo] = &[
    WakewordInfo {
        id: "alexa",
        display_name: "Alexa (English)",
        file_name: "alexa.rpw",
        language: "en",
        source_url: "https://github.com/GiviMAD/rustpotter",
    },
    WakewordInfo {
        id: "ok-casa",
        display_name: "Ok Casa (Spanish)",
        file_name: "ok_casa.rpw",
        language: "es",
        source_url: "https://github.com/GiviMAD/rustpotter",
    },
    WakewordInfo {
        id: "computer",
        display_name: "Computer (English)",
        file_name: "computer.rpw",
        language: "en",
        source_url: "https://github.com/GiviMAD/rustpotter",
    },
];

/// Find a [`WakewordInfo`] by its `id` string.
pub fn find_wakeword_by_id(id: &str) -> Option<&'static WakewordInfo> {
    COMMUNITY_WAKEWORDS.iter().find(|w| w.id == id)
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

/// Resolves the on-disk location of wake-word model files.
///
/// ```rust,no_run
/// use wake_listener::config::AppPaths;
/// use wake_listener::engine::{ModelPaths, COMMUNITY_WAKEWORDS};
///
/// let paths = ModelPaths::from_app_paths(&AppPaths::new());
/// let available: Vec<_> = COMMUNITY_WAKEWORDS.iter()
///     .filter(|w| paths.is_available(w))
///     .collect();
/// ```
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Directory that contains (or will contain) `.rpw` files.
    pub models_dir: PathBuf,
}

impl ModelPaths {
    /// Build a [`ModelPaths`] from the application's [`AppPaths`].
    pub fn from_app_paths(app_paths: &AppPaths) -> Self {
        Self {
            models_dir: app_paths.models_dir.clone(),
        }
    }

    /// Construct directly from a models directory path (useful in tests).
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Full path to the model file for the given wakeword.
    pub fn model_path(&self, wakeword: &WakewordInfo) -> PathBuf {
        self.models_dir.join(wakeword.file_name)
    }

    /// Returns `true` if the model file exists on disk.
    pub fn is_available(&self, wakeword: &WakewordInfo) -> bool {
        self.model_path(wakeword).exists()
    }

    /// Returns all registry wakewords that are present on disk.
    pub fn list_local_models(&self) -> Vec<&'static WakewordInfo> {
        COMMUNITY_WAKEWORDS
            .iter()
            .filter(|w| self.is_available(w))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
