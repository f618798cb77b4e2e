//! Streaming capture-and-detect pipeline.
//!
//! Two long-running tasks share one engine session and one run flag:
//!
//! ```text
//! AudioSource ──read──▶ FeedTask ──reduce_bit_depth──▶ engine.feed()
//!                          │                                ║ (session-internal
//!                          │ RunFlag (Arc<AtomicBool>)      ║  bounded queue)
//!                          │                                ▼
//! WakeEvent (mpsc) ◀──DetectTask ◀────fetch────── engine.fetch()
//! ```
//!
//! [`PipelineController::start`] creates the session and spawns both tasks
//! on dedicated OS threads; [`PipelineController::stop`] clears the flag,
//! joins them and destroys the session.  The session is the only
//! synchronisation point between the tasks, and the engine guarantees one
//! concurrent feeder plus one concurrent fetcher — the pipeline adds no
//! locking of its own.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::{mpsc, Arc};
//! use std::time::Duration;
//! use wake_listener::audio::CpalCapture;
//! use wake_listener::engine::{DetectionEngine, EngineConfig, RustpotterEngine};
//! use wake_listener::pipeline::PipelineController;
//!
//! let engine: Arc<dyn DetectionEngine> = Arc::new(RustpotterEngine::new());
//! let mut controller = PipelineController::new(engine);
//!
//! let capture = CpalCapture::new().unwrap();
//! let (source, _stream) = capture.start(Duration::from_millis(100)).unwrap();
//! let config = EngineConfig {
//!     sample_rate: capture.sample_rate(),
//!     channels: capture.channels(),
//!     model_paths: vec!["models/alexa.rpw".into()],
//!     ..EngineConfig::default()
//! };
//!
//! let (event_tx, event_rx) = mpsc::channel();
//! controller.start(Box::new(source), &config, event_tx).unwrap();
//! for event in event_rx.iter() {
//!     println!("wake word: model {} keyword {}", event.model_index, event.keyword_index);
//! }
//! ```

pub mod controller;
mod detect;
mod feed;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{PipelineController, PipelineError, RunFlag, DEFAULT_BACKOFF};
