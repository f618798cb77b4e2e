//! Pipeline lifecycle — session ownership, run flag, task start/stop.
//!
//! [`PipelineController`] owns the engine session and the shared run flag.
//! [`start`](PipelineController::start) creates the session, raises the
//! flag and launches the two dedicated OS threads (`wake-feed`,
//! `wake-detect`); [`stop`](PipelineController::stop) clears the flag,
//! joins both threads and only then destroys the session — the
//! destroy-happens-after-last-engine-call ordering is enforced by joining
//! before [`std::sync::Arc::try_unwrap`] can succeed.
//!
//! Exactly one session may be active per controller.  Starting twice
//! without an intervening stop, or stopping an idle controller, is a caller
//! error reported synchronously — never silently absorbed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

use crate::audio::AudioSource;
use crate::engine::{DetectionEngine, EngineConfig, EngineError, Session, WakeEvent};

use super::{detect, feed};

// ---------------------------------------------------------------------------
// RunFlag
// ---------------------------------------------------------------------------

/// Shared cancellation token for the two pipeline tasks.
///
/// Written at most once per transition (`true` at start, `false` at stop)
/// and read-only inside the task loops, so relaxed atomic ordering is
/// sufficient — the flag carries no data other tasks must observe.
pub type RunFlag = Arc<AtomicBool>;

/// Default delay the detect task sleeps when no result is ready.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors reported by [`PipelineController`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start` was called while a session is already active.
    #[error("pipeline is already running — stop it before starting again")]
    AlreadyRunning,

    /// `stop` was called on a controller that was never started.
    #[error("pipeline is not running")]
    NotRunning,

    /// Session creation failed; nothing was started.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The OS refused to spawn a task thread; anything already started has
    /// been torn down.
    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// PipelineController
// ---------------------------------------------------------------------------

/// Process-wide lifecycle object for the capture-and-detect pipeline.
///
/// ```rust,no_run
/// use std::sync::{mpsc, Arc};
/// use std::time::Duration;
/// use wake_listener::audio::CpalCapture;
/// use wake_listener::engine::{DetectionEngine, EngineConfig, RustpotterEngine};
/// use wake_listener::pipeline::PipelineController;
///
/// let engine: Arc<dyn DetectionEngine> = Arc::new(RustpotterEngine::new());
/// let mut controller = PipelineController::new(engine);
///
/// let capture = CpalCapture::new().unwrap();
/// let (source, _stream) = capture.start(Duration::from_millis(100)).unwrap();
///
/// let config = EngineConfig {
///     sample_rate: capture.sample_rate(),
///     channels: capture.channels(),
///     model_paths: vec!["models/alexa.rpw".into()],
///     ..EngineConfig::default()
/// };
///
/// let (event_tx, event_rx) = mpsc::channel();
/// controller.start(Box::new(source), &config, event_tx).unwrap();
///
/// let event = event_rx.recv().unwrap();
/// println!("wake word! model {}", event.model_index);
///
/// controller.stop().unwrap();
/// ```
pub struct PipelineController {
    engine: Arc<dyn DetectionEngine>,
    backoff: Duration,
    active: Option<ActivePipeline>,
}

/// Everything that exists only while the pipeline runs.
struct ActivePipeline {
    run: RunFlag,
    session: Arc<Session>,
    feed: JoinHandle<()>,
    detect: JoinHandle<()>,
}

impl PipelineController {
    /// Create a controller with the default detect backoff.
    pub fn new(engine: Arc<dyn DetectionEngine>) -> Self {
        Self::with_backoff(engine, DEFAULT_BACKOFF)
    }

    /// Create a controller with an explicit detect backoff delay.
    pub fn with_backoff(engine: Arc<dyn DetectionEngine>, backoff: Duration) -> Self {
        Self {
            engine,
            backoff,
            active: None,
        }
    }

    /// Returns `true` while a session is active.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Create a session from `config` and launch the feed and detect tasks.
    ///
    /// `source` must be an already-initialised audio source — taking it by
    /// value makes "start before the microphone is up" unrepresentable.
    /// Wake events are delivered on `events`; the caller keeps the receiver.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyRunning`] if a session is active.
    /// - [`PipelineError::Engine`] if session creation fails.
    /// - [`PipelineError::Spawn`] if a task thread cannot be created; any
    ///   partially started task is stopped and the session destroyed before
    ///   this returns.
    pub fn start(
        &mut self,
        source: Box<dyn AudioSource + Send>,
        config: &EngineConfig,
        events: mpsc::Sender<WakeEvent>,
    ) -> Result<(), PipelineError> {
        if self.active.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let session = Arc::new(self.engine.create_session(config)?);
        let run: RunFlag = Arc::new(AtomicBool::new(true));

        let feed = {
            let engine = Arc::clone(&self.engine);
            let session = Arc::clone(&session);
            let run = Arc::clone(&run);
            std::thread::Builder::new()
                .name("wake-feed".into())
                .spawn(move || feed::feed_loop(source, engine, session, run))
        };
        let feed = match feed {
            Ok(handle) => handle,
            Err(e) => {
                self.destroy(session);
                return Err(PipelineError::Spawn {
                    task: "feed",
                    source: e,
                });
            }
        };

        let detect = {
            let engine = Arc::clone(&self.engine);
            let session = Arc::clone(&session);
            let run = Arc::clone(&run);
            let backoff = self.backoff;
            std::thread::Builder::new()
                .name("wake-detect".into())
                .spawn(move || detect::detect_loop(engine, session, run, events, backoff))
        };
        let detect = match detect {
            Ok(handle) => handle,
            Err(e) => {
                // Tear the half-started pipeline down before reporting.
                run.store(false, Ordering::Relaxed);
                join_task("feed", feed);
                self.destroy(session);
                return Err(PipelineError::Spawn {
                    task: "detect",
                    source: e,
                });
            }
        };

        self.active = Some(ActivePipeline {
            run,
            session,
            feed,
            detect,
        });
        log::info!("pipeline: started");
        Ok(())
    }

    /// Request cooperative shutdown and wait for both tasks to exit, then
    /// destroy the session.
    ///
    /// Does not return until both tasks have observed the cleared flag —
    /// bounded by one source read timeout (feed) plus one backoff delay
    /// (detect).  There is no preemptive cancellation of an in-flight read.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotRunning`] if no session is active.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let active = self.active.take().ok_or(PipelineError::NotRunning)?;

        active.run.store(false, Ordering::Relaxed);
        join_task("feed", active.feed);
        join_task("detect", active.detect);

        self.destroy(active.session);
        log::info!("pipeline: stopped");
        Ok(())
    }

    /// Recover unique ownership of the session and destroy it.
    fn destroy(&self, session: Arc<Session>) {
        match Arc::try_unwrap(session) {
            Ok(session) => self.engine.destroy_session(session),
            Err(shared) => {
                // Unreachable once both tasks have joined; never destroy a
                // session another thread can still reach.
                log::error!(
                    "pipeline: session {} still shared, leaking it instead of destroying",
                    shared.id()
                );
            }
        }
    }
}

fn join_task(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log::error!("pipeline: {name} task panicked");
    }
}

impl Drop for PipelineController {
    /// Stop a still-running pipeline so the session is never leaked.
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("pipeline: stop on drop failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MockRead, MockSource};
    use crate::engine::{FetchStatus, MockEngine};

    const CHUNK: usize = 4;

    fn controller_with(engine: &Arc<MockEngine>) -> PipelineController {
        let dyn_engine: Arc<dyn DetectionEngine> = engine.clone();
        PipelineController::with_backoff(dyn_engine, Duration::from_millis(1))
    }

    fn idle_source() -> Box<dyn AudioSource + Send> {
        Box::new(MockSource::new(Vec::new()))
    }

    // ---- Lifecycle ---------------------------------------------------------

    #[test]
    fn start_then_stop_destroys_the_session_once() {
        let engine = Arc::new(MockEngine::new(CHUNK));
        let mut controller = controller_with(&engine);
        let (tx, _rx) = mpsc::channel();

        controller.start(idle_source(), &EngineConfig::default(), tx).unwrap();
        assert!(controller.is_running());

        std::thread::sleep(Duration::from_millis(10));
        controller.stop().unwrap();

        assert!(!controller.is_running());
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.destroyed(), 1);
        assert!(
            !engine.used_after_destroy(),
            "no engine call may happen after destroy"
        );
    }

    #[test]
    fn start_twice_reports_misuse_and_creates_no_second_session() {
        let engine = Arc::new(MockEngine::new(CHUNK));
        let mut controller = controller_with(&engine);
        let (tx, _rx) = mpsc::channel();

        controller.start(idle_source(), &EngineConfig::default(), tx).unwrap();

        let (tx2, _rx2) = mpsc::channel();
        let result = controller.start(idle_source(), &EngineConfig::default(), tx2);
        assert!(matches!(result, Err(PipelineError::AlreadyRunning)));
        assert_eq!(engine.created(), 1);

        controller.stop().unwrap();
    }

    #[test]
    fn stop_without_start_reports_misuse() {
        let engine = Arc::new(MockEngine::new(CHUNK));
        let mut controller = controller_with(&engine);
        assert!(matches!(controller.stop(), Err(PipelineError::NotRunning)));
    }

    #[test]
    fn restart_after_stop_is_allowed() {
        let engine = Arc::new(MockEngine::new(CHUNK));
        let mut controller = controller_with(&engine);

        let (tx, _rx) = mpsc::channel();
        controller.start(idle_source(), &EngineConfig::default(), tx).unwrap();
        controller.stop().unwrap();

        let (tx, _rx) = mpsc::channel();
        controller.start(idle_source(), &EngineConfig::default(), tx).unwrap();
        controller.stop().unwrap();

        assert_eq!(engine.created(), 2);
        assert_eq!(engine.destroyed(), 2);
    }

    #[test]
    fn failed_session_creation_starts_nothing() {
        // An engine with no live sessions rejects feeds; here we force the
        // failure earlier by scripting create_session to fail via NoModels
        // on the production engine instead — the mock never fails, so use
        // a config-rejecting engine double.
        struct RejectingEngine;
        impl DetectionEngine for RejectingEngine {
            fn create_session(&self, _: &EngineConfig) -> Result<Session, EngineError> {
                Err(EngineError::NoModels)
            }
            fn feed_chunk_size(&self, _: &Session) -> usize {
                0
            }
            fn feed(&self, _: &Session, _: &[i16]) -> Result<(), EngineError> {
                unreachable!("no session exists")
            }
            fn fetch(&self, _: &Session) -> Result<FetchStatus, EngineError> {
                unreachable!("no session exists")
            }
            fn destroy_session(&self, _: Session) {}
        }

        let mut controller = PipelineController::new(Arc::new(RejectingEngine));
        let (tx, _rx) = mpsc::channel();
        let result = controller.start(idle_source(), &EngineConfig::default(), tx);

        assert!(matches!(
            result,
            Err(PipelineError::Engine(EngineError::NoModels))
        ));
        assert!(!controller.is_running());
    }

    #[test]
    fn drop_stops_a_running_pipeline() {
        let engine = Arc::new(MockEngine::new(CHUNK));
        {
            let mut controller = controller_with(&engine);
            let (tx, _rx) = mpsc::channel();
            controller.start(idle_source(), &EngineConfig::default(), tx).unwrap();
        } // dropped while running

        assert_eq!(engine.destroyed(), 1);
        assert!(!engine.used_after_destroy());
    }

    // ---- End-to-end through both tasks -------------------------------------

    #[test]
    fn audio_flows_from_source_to_engine_and_events_flow_back() {
        let engine = Arc::new(MockEngine::with_script(
            CHUNK,
            vec![
                Ok(FetchStatus::Listening),
                Ok(FetchStatus::Detected(WakeEvent {
                    model_index: 0,
                    keyword_index: 2,
                })),
            ],
        ));
        let mut controller = controller_with(&engine);

        let source = MockSource::new(vec![MockRead::Samples(vec![0x0001_0000; CHUNK])]);
        let (tx, rx) = mpsc::channel();
        controller.start(Box::new(source), &EngineConfig::default(), tx).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).expect("wake event");
        assert_eq!((event.model_index, event.keyword_index), (0, 2));

        controller.stop().unwrap();

        let feeds = engine.feeds();
        assert!(!feeds.is_empty(), "the scripted chunk must have been fed");
        assert_eq!(feeds[0], vec![1; CHUNK]);
        assert!(!engine.used_after_destroy());
    }
}
