//! Always-on wake-word listener.
//!
//! Captures microphone audio continuously, reduces it to the sample format
//! the detection engine consumes, streams it into the engine and polls for
//! wake-word activations — all without ever pausing capture, because the
//! hardware cannot be paused.
//!
//! # Data flow
//!
//! ```text
//! ┌─────────────┐   i32 samples   ┌──────────┐   i16 samples   ┌────────────────┐
//! │ AudioSource │ ──────────────▶ │ FeedTask │ ──────────────▶ │ DetectionEngine│
//! │ (cpal mic)  │  blocking read  └──────────┘  engine.feed()  │   (rustpotter) │
//! └─────────────┘                                              └───────┬────────┘
//!                                                                      │ fetch()
//!                               ┌────────────┐    WakeEvent (mpsc)     ▼
//!                 subscriber ◀──│ DetectTask │ ◀──────────────── detection result
//!                               └────────────┘
//! ```
//!
//! The two tasks run on dedicated OS threads, share exactly one engine
//! session, and shut down cooperatively through a single run flag owned by
//! [`pipeline::PipelineController`].
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
//! let capture = CpalCapture::new().expect("no microphone");
//! let (source, _stream) = capture.start(Duration::from_millis(100)).unwrap();
//!
//! let engine: Arc<dyn DetectionEngine> = Arc::new(RustpotterEngine::new());
//! let config = EngineConfig {
//!     sample_rate: capture.sample_rate(),
//!     channels: capture.channels(),
//!     model_paths: vec!["models/alexa.rpw".into()],
//!     ..EngineConfig::default()
//! };
//!
//! let (event_tx, event_rx) = mpsc::channel();
//! let mut controller = PipelineController::new(engine);
//! controller.start(Box::new(source), &config, event_tx).unwrap();
//!
//! let event = event_rx.recv().unwrap();
//! println!("wake word detected: model {}", event.model_index);
//! ```

pub mod audio;
pub mod config;
pub mod engine;
pub mod pipeline;
