//! Core detection-engine trait and shared types.
//!
//! # Overview
//!
//! [`DetectionEngine`] is the seam between the pipeline and whatever does
//! the actual wake-word scoring.  It is object-safe and `Send + Sync` so it
//! can be held behind an `Arc<dyn DetectionEngine>` and called from the feed
//! and detect tasks concurrently.
//!
//! A [`Session`] is an opaque handle the engine hands out from
//! [`create_session`](DetectionEngine::create_session).  Engines guarantee
//! that one concurrent feeder and one concurrent fetcher per session are
//! safe; the pipeline adds no locking of its own around the session.
//! [`destroy_session`](DetectionEngine::destroy_session) takes the session
//! by value, so a destroyed session cannot be fed or fetched again.
//!
//! [`RustpotterEngine`](super::RustpotterEngine) is the production
//! implementation.  [`MockEngine`] (available under `#[cfg(test)]`) replays
//! a scripted fetch sequence and records every feed — useful for
//! unit-testing the pipeline without any model file.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration consumed by [`DetectionEngine::create_session`].
///
/// Built from the model catalog and the capture parameters; opaque to the
/// pipeline itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sample rate of the audio that will be fed, in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels in the fed audio.  Channel handling
    /// (downmix, beamforming) is engine-internal.
    pub channels: u16,
    /// Detection score threshold (0.0 – 1.0).
    pub threshold: f32,
    /// Wake-word model files to load, in reporting order — the index of a
    /// path here is the `model_index` reported in a [`WakeEvent`].
    pub model_paths: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            threshold: 0.5,
            model_paths: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Opaque handle to one engine session.
///
/// Created by [`DetectionEngine::create_session`] and consumed by
/// [`DetectionEngine::destroy_session`].  Deliberately not `Clone`: share it
/// across tasks behind an `Arc`, then recover unique ownership with
/// [`std::sync::Arc::try_unwrap`] once every task has exited — the
/// destroy-happens-after-last-call ordering falls out of ownership.
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    id: u64,
}

impl Session {
    /// Construct a session handle.  Called by engine implementations only;
    /// pipeline code treats sessions as opaque.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Engine-assigned session id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

// ---------------------------------------------------------------------------
// WakeEvent / FetchStatus
// ---------------------------------------------------------------------------

/// The externally observable output of the pipeline: one wake activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeEvent {
    /// Index of the matched model in [`EngineConfig::model_paths`] order.
    pub model_index: usize,
    /// Index of the matched keyword within that model.
    pub keyword_index: usize,
}

/// Outcome of one [`DetectionEngine::fetch`] poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing to score this poll — the caller should back off briefly.
    NotReady,
    /// One chunk was scored without an activation; poll again immediately.
    Listening,
    /// A wake word was detected.  Listening resumes on the next poll.
    Detected(WakeEvent),
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// All errors that can arise from a detection engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// `create_session` was called with no model paths.
    #[error("no wake-word models configured")]
    NoModels,

    /// A configured model file does not exist or is unusable as a path.
    #[error("wake-word model not found: {0}")]
    ModelNotFound(String),

    /// The underlying engine failed to initialise or load a model.
    #[error("engine initialisation failed: {0}")]
    Init(String),

    /// The session is unknown to this engine (never created or destroyed).
    #[error("unknown or destroyed session (id {0})")]
    InvalidSession(u64),

    /// A fetch failed inside the engine.  Treated as transient by the
    /// detect task — it backs off and retries.
    #[error("fetch failed: {0}")]
    Fetch(String),
}

// ---------------------------------------------------------------------------
// DetectionEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a wake-word detection engine.
///
/// # Contract
///
/// - A session supports exactly one concurrent feeder and one concurrent
///   fetcher; the engine provides the mutual exclusion internally.
/// - `samples` passed to [`feed`](Self::feed) are 16-bit signed PCM; a call
///   may carry fewer than [`feed_chunk_size`](Self::feed_chunk_size)
///   samples after a truncated read.
/// - No ordering is guaranteed between a given feed call and a given fetch
///   result; the engine buffers internally.
pub trait DetectionEngine: Send + Sync {
    /// Create a new session from `config`.
    fn create_session(&self, config: &EngineConfig) -> Result<Session, EngineError>;

    /// Number of samples the engine wants per feed call for this session.
    ///
    /// Returns 0 for an unknown session — callers treat that as a fatal
    /// startup condition.
    fn feed_chunk_size(&self, session: &Session) -> usize;

    /// Ingest converted samples into the session.
    fn feed(&self, session: &Session, samples: &[i16]) -> Result<(), EngineError>;

    /// Poll the session for a detection result.
    fn fetch(&self, session: &Session) -> Result<FetchStatus, EngineError>;

    /// Destroy the session.  Consumes the handle, so no further call can
    /// reference it.
    fn destroy_session(&self, session: Session);
}

// Compile-time assertion: Box<dyn DetectionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn DetectionEngine>) {}
};

// ---------------------------------------------------------------------------
// MockEngine  (test-only)
// ---------------------------------------------------------------------------

/// A test double that records feeds and replays a scripted fetch sequence.
///
/// Every call on a destroyed (or never-created) session is flagged via
/// [`used_after_destroy`](Self::used_after_destroy), so lifecycle tests can
/// assert the destroy-happens-after-last-call ordering.
#[cfg(test)]
pub struct MockEngine {
    chunk_size: usize,
    next_id: std::sync::atomic::AtomicU64,
    live: std::sync::Mutex<std::collections::HashSet<u64>>,
    feeds: std::sync::Mutex<Vec<Vec<i16>>>,
    script: std::sync::Mutex<std::collections::VecDeque<Result<FetchStatus, EngineError>>>,
    fetch_calls: std::sync::atomic::AtomicUsize,
    created: std::sync::atomic::AtomicUsize,
    destroyed: std::sync::atomic::AtomicUsize,
    used_after_destroy: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockEngine {
    /// Create a mock whose sessions report the given feed chunk size and
    /// whose fetch calls return `NotReady` once the script is empty.
    pub fn new(chunk_size: usize) -> Self {
        Self::with_script(chunk_size, Vec::new())
    }

    /// Create a mock that replays `script` front-to-back on fetch calls.
    pub fn with_script(chunk_size: usize, script: Vec<Result<FetchStatus, EngineError>>) -> Self {
        Self {
            chunk_size,
            next_id: std::sync::atomic::AtomicU64::new(1),
            live: std::sync::Mutex::new(std::collections::HashSet::new()),
            feeds: std::sync::Mutex::new(Vec::new()),
            script: std::sync::Mutex::new(script.into()),
            fetch_calls: std::sync::atomic::AtomicUsize::new(0),
            created: std::sync::atomic::AtomicUsize::new(0),
            destroyed: std::sync::atomic::AtomicUsize::new(0),
            used_after_destroy: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Every batch of samples fed so far, in feed order.
    pub fn feeds(&self) -> Vec<Vec<i16>> {
        self.feeds.lock().unwrap().clone()
    }

    /// Total number of fetch calls observed.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of sessions created.
    pub fn created(&self) -> usize {
        self.created.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of sessions destroyed.
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// `true` if any feed or fetch referenced a destroyed/unknown session.
    pub fn used_after_destroy(&self) -> bool {
        self.used_after_destroy
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    fn check_live(&self, id: u64) -> Result<(), EngineError> {
        if self.live.lock().unwrap().contains(&id) {
            Ok(())
        } else {
            self.used_after_destroy
                .store(true, std::sync::atomic::Ordering::Relaxed);
            Err(EngineError::InvalidSession(id))
        }
    }
}

#[cfg(test)]
impl DetectionEngine for MockEngine {
    fn create_session(&self, _config: &EngineConfig) -> Result<Session, EngineError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.live.lock().unwrap().insert(id);
        self.created
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(Session::new(id))
    }

    fn feed_chunk_size(&self, session: &Session) -> usize {
        if self.live.lock().unwrap().contains(&session.id()) {
            self.chunk_size
        } else {
            0
        }
    }

    fn feed(&self, session: &Session, samples: &[i16]) -> Result<(), EngineError> {
        self.check_live(session.id())?;
        self.feeds.lock().unwrap().push(samples.to_vec());
        Ok(())
    }

    fn fetch(&self, session: &Session) -> Result<FetchStatus, EngineError> {
        self.fetch_calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.check_live(session.id())?;
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(FetchStatus::NotReady),
        }
    }

    fn destroy_session(&self, session: Session) {
        if self.live.lock().unwrap().remove(&session.id()) {
            self.destroyed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // --- MockEngine lifecycle ---

    #[test]
    fn mock_creates_and_destroys_sessions() {
        let engine = MockEngine::new(4);
        let session = engine.create_session(&EngineConfig::default()).unwrap();
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.feed_chunk_size(&session), 4);

        engine.destroy_session(session);
        assert_eq!(engine.destroyed(), 1);
    }

    #[test]
    fn mock_records_feeds_in_order() {
        let engine = MockEngine::new(4);
        let session = engine.create_session(&EngineConfig::default()).unwrap();

        engine.feed(&session, &[1, 2, 3]).unwrap();
        engine.feed(&session, &[4]).unwrap();

        assert_eq!(engine.feeds(), vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn mock_flags_feed_after_destroy() {
        let engine = MockEngine::new(4);
        let session = engine.create_session(&EngineConfig::default()).unwrap();
        let stale = Session::new(session.id());
        engine.destroy_session(session);

        assert!(engine.feed(&stale, &[1]).is_err());
        assert!(engine.used_after_destroy());
    }

    #[test]
    fn mock_replays_script_then_idles() {
        let engine = MockEngine::with_script(
            4,
            vec![
                Ok(FetchStatus::Listening),
                Ok(FetchStatus::Detected(WakeEvent {
                    model_index: 1,
                    keyword_index: 0,
                })),
            ],
        );
        let session = engine.create_session(&EngineConfig::default()).unwrap();

        assert_eq!(engine.fetch(&session).unwrap(), FetchStatus::Listening);
        assert!(matches!(
            engine.fetch(&session).unwrap(),
            FetchStatus::Detected(_)
        ));
        assert_eq!(engine.fetch(&session).unwrap(), FetchStatus::NotReady);
        assert_eq!(engine.fetch_calls(), 3);
    }

    // --- Trait object safety ---

    #[test]
    fn arc_dyn_detection_engine_compiles() {
        let engine: Arc<dyn DetectionEngine> = Arc::new(MockEngine::new(4));
        let session = engine.create_session(&EngineConfig::default()).unwrap();
        assert_eq!(engine.feed_chunk_size(&session), 4);
        engine.destroy_session(session);
    }

    // --- EngineError display ---

    #[test]
    fn engine_error_display_invalid_session() {
        let e = EngineError::InvalidSession(7);
        assert!(e.to_string().contains('7'));
    }

    #[test]
    fn engine_error_display_model_not_found() {
        let e = EngineError::ModelNotFound("/some/model.rpw".into());
        assert!(e.to_string().contains("/some/model.rpw"));
    }

    // --- EngineConfig defaults ---

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.channels, 1);
        assert!(config.model_paths.is_empty());
    }
}
