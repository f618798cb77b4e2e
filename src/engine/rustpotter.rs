//! Production [`DetectionEngine`] backed by the `rustpotter` crate.
//!
//! Each session pairs a bounded ingestion queue (feed side) with a
//! `Rustpotter` scorer (fetch side).  The two sit behind **separate** locks,
//! so the single writer pushing audio never waits for a scoring pass and the
//! single reader never blocks ingestion — this is the engine-internal
//! mutual-exclusion guarantee the pipeline relies on, made explicit as the
//! queue between the capture and detection stages.
//!
//! `feed` accepts 16-bit PCM; rustpotter is configured for f32 input, so the
//! scorer rescales one frame at a time into a reusable scratch buffer before
//! scoring.  A detection is mapped back to the index its model had in
//! [`EngineConfig::model_paths`], which is the `model_index` the pipeline
//! reports.  Rustpotter models carry a single keyword, so `keyword_index`
//! is always 0 for this engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

use super::detector::{
    DetectionEngine, EngineConfig, EngineError, FetchStatus, Session, WakeEvent,
};
use crate::audio::SampleQueue;

/// Frames the ingestion queue holds before overwriting the oldest audio.
/// At rustpotter's ~30 ms frame this buffers roughly one second, which is
/// plenty of slack for a slow scoring pass without growing without bound.
const QUEUE_FRAMES: usize = 32;

// ---------------------------------------------------------------------------
// RustpotterEngine
// ---------------------------------------------------------------------------

/// Wake-word detection engine wrapping `rustpotter`.
///
/// Sessions are tracked in an id-keyed map; the [`Session`] handle the
/// pipeline holds is just the id.  One engine can serve multiple sessions,
/// each with its own models and scorer state.
pub struct RustpotterEngine {
    sessions: Mutex<HashMap<u64, Arc<SessionState>>>,
    next_id: AtomicU64,
}

struct SessionState {
    chunk_size: usize,
    /// Feed side — own lock, so ingestion never waits on scoring.
    frames: Mutex<SampleQueue<i16>>,
    /// Fetch side — the scorer and its scratch buffers.
    scorer: Mutex<Scorer>,
}

struct Scorer {
    detector: Rustpotter,
    /// Wakeword keys in `EngineConfig::model_paths` order, for mapping a
    /// detection back to its model index.
    model_names: Vec<String>,
    /// One frame of 16-bit samples popped from the queue.
    chunk: Vec<i16>,
    /// The same frame rescaled to f32 for rustpotter.
    scratch: Vec<f32>,
}

impl RustpotterEngine {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn state(&self, session: &Session) -> Result<Arc<SessionState>, EngineError> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session.id())
            .cloned()
            .ok_or(EngineError::InvalidSession(session.id()))
    }
}

impl Default for RustpotterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine for RustpotterEngine {
    fn create_session(&self, config: &EngineConfig) -> Result<Session, EngineError> {
        if config.model_paths.is_empty() {
            return Err(EngineError::NoModels);
        }

        let mut rp_config = RustpotterConfig::default();
        rp_config.fmt.sample_rate = config.sample_rate as usize;
        rp_config.fmt.channels = config.channels;
        rp_config.fmt.sample_format = SampleFormat::F32;
        rp_config.detector.threshold = config.threshold;

        let mut detector =
            Rustpotter::new(&rp_config).map_err(|e| EngineError::Init(e.to_string()))?;

        let mut model_names = Vec::with_capacity(config.model_paths.len());
        for path in &config.model_paths {
            if !path.exists() {
                return Err(EngineError::ModelNotFound(path.display().to_string()));
            }
            let path_str = path.to_str().ok_or_else(|| {
                EngineError::ModelNotFound(format!(
                    "model path contains non-UTF-8 characters: {}",
                    path.display()
                ))
            })?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("wakeword")
                .to_string();

            detector
                .add_wakeword_from_file(&name, path_str)
                .map_err(|e| EngineError::Init(e.to_string()))?;
            model_names.push(name);
        }

        let chunk_size = detector.get_samples_per_frame();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let state = Arc::new(SessionState {
            chunk_size,
            frames: Mutex::new(SampleQueue::new(chunk_size * QUEUE_FRAMES)),
            scorer: Mutex::new(Scorer {
                detector,
                model_names,
                chunk: vec![0; chunk_size],
                scratch: vec![0.0; chunk_size],
            }),
        });
        self.sessions.lock().unwrap().insert(id, state);

        log::info!(
            "engine: session {id} created ({} model(s), chunk size {chunk_size})",
            config.model_paths.len()
        );
        Ok(Session::new(id))
    }

    fn feed_chunk_size(&self, session: &Session) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .get(&session.id())
            .map(|state| state.chunk_size)
            .unwrap_or(0)
    }

    fn feed(&self, session: &Session, samples: &[i16]) -> Result<(), EngineError> {
        let state = self.state(session)?;
        let mut frames = state.frames.lock().unwrap();
        let dropped_before = frames.dropped();
        frames.push_slice(samples);
        let dropped = frames.dropped() - dropped_before;
        if dropped > 0 {
            log::trace!("engine: ingestion queue overran, {dropped} samples overwritten");
        }
        Ok(())
    }

    fn fetch(&self, session: &Session) -> Result<FetchStatus, EngineError> {
        let state = self.state(session)?;
        let mut scorer = state.scorer.lock().unwrap();
        let scorer = &mut *scorer;

        // Take exactly one frame under the queue lock, score outside it.
        let popped = {
            let mut frames = state.frames.lock().unwrap();
            frames.pop_chunk(&mut scorer.chunk)
        };
        if !popped {
            return Ok(FetchStatus::NotReady);
        }

        for (dst, &src) in scorer.scratch.iter_mut().zip(&scorer.chunk) {
            *dst = src as f32 / 32_768.0;
        }

        match scorer.detector.process_samples(scorer.scratch.clone()) {
            Some(detection) => {
                let model_index = scorer
                    .model_names
                    .iter()
                    .position(|name| *name == detection.name)
                    .unwrap_or(0);
                log::debug!(
                    "engine: wakeword '{}' activated (score {:.3})",
                    detection.name,
                    detection.score
                );
                Ok(FetchStatus::Detected(WakeEvent {
                    model_index,
                    keyword_index: 0,
                }))
            }
            None => Ok(FetchStatus::Listening),
        }
    }

    fn destroy_session(&self, session: Session) {
        if self.sessions.lock().unwrap().remove(&session.id()).is_some() {
            log::info!("engine: session {} destroyed", session.id());
        } else {
            log::warn!("engine: destroy of unknown session {}", session.id());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
