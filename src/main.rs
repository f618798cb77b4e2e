//! Application entry point — always-on wake-word listener.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Start microphone capture (`cpal`).
//! 4. Resolve configured wake-word models via the catalog.
//! 5. Create the detection engine and the [`PipelineController`].
//! 6. Start the pipeline (spawns the feed and detect tasks).
//! 7. Block on the wake-event channel, reporting each detection — the
//!    listener runs until the process is terminated.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Context;

use wake_listener::{
    audio::CpalCapture,
    config::{AppConfig, AppPaths, DetectorConfig},
    engine::{find_wakeword_by_id, DetectionEngine, EngineConfig, ModelPaths, RustpotterEngine},
    pipeline::PipelineController,
};

// ---------------------------------------------------------------------------
// Model resolution
// ---------------------------------------------------------------------------

/// Map configured model ids to on-disk `.rpw` paths.
///
/// Each entry is first looked up in the community registry; anything else is
/// treated as a literal file path so users can point at their own models.
/// Missing files are skipped with a warning — a listener with one bad entry
/// should still start on the good ones.
fn resolve_model_paths(detector: &DetectorConfig, paths: &ModelPaths) -> Vec<PathBuf> {
    let mut resolved = Vec::new();

    for id in &detector.models {
        match find_wakeword_by_id(id) {
            Some(info) => {
                let path = paths.model_path(info);
                if path.exists() {
                    log::info!("model '{}' ({}): {}", id, info.display_name, path.display());
                    resolved.push(path);
                } else {
                    log::warn!(
                        "model '{}' is not downloaded (expected {}; see {})",
                        id,
                        path.display(),
                        info.source_url
                    );
                }
            }
            None => {
                let path = PathBuf::from(id);
                if path.exists() {
                    log::info!("model file: {}", path.display());
                    resolved.push(path);
                } else {
                    log::warn!("unknown model id or missing file: {id}");
                }
            }
        }
    }

    resolved
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("wake-listener starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Microphone capture
    let capture = CpalCapture::new().context("audio capture unavailable")?;
    log::info!(
        "audio capture ready ({} Hz, {} ch)",
        capture.sample_rate(),
        capture.channels()
    );
    let read_timeout = Duration::from_millis(config.audio.read_timeout_ms);
    let (source, _stream) = capture
        .start(read_timeout)
        .context("failed to start audio stream")?;

    // 4. Wake-word models
    let model_paths = ModelPaths::from_app_paths(&AppPaths::new());
    let resolved = resolve_model_paths(&config.detector, &model_paths);
    if resolved.is_empty() {
        anyhow::bail!(
            "no wake-word models available — download a .rpw file into {}",
            model_paths.models_dir.display()
        );
    }

    let engine_config = EngineConfig {
        sample_rate: capture.sample_rate(),
        channels: capture.channels(),
        threshold: config.detector.threshold,
        model_paths: resolved,
    };

    // 5. Engine + controller
    let engine: Arc<dyn DetectionEngine> = Arc::new(RustpotterEngine::new());
    let mut controller =
        PipelineController::with_backoff(engine, Duration::from_millis(config.detector.backoff_ms));

    // 6. Start the pipeline
    let (event_tx, event_rx) = mpsc::channel();
    controller
        .start(Box::new(source), &engine_config, event_tx)
        .context("failed to start pipeline")?;
    log::info!("listening for wake words: {:?}", config.detector.models);

    // 7. Report detections until the process is terminated.  The iterator
    //    only ends if the detect task exits, i.e. after a stop request.
    for event in event_rx.iter() {
        println!(
            ">>> wake word detected (model {}, keyword {})",
            event.model_index, event.keyword_index
        );
    }

    controller.stop().context("failed to stop pipeline")?;
    Ok(())
}
