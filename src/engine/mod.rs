//! Wake-word detection engine module.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │              DetectionEngine (trait)                  │
//! │                                                       │
//! │   ┌──────────────┐      ┌──────────────────┐          │
//! │   │  ModelPaths  │      │ RustpotterEngine │          │
//! │   │ - resolve    │─────▶│ - sessions       │          │
//! │   │ - available? │      │ - scorer         │          │
//! │   └──────────────┘      └────────┬─────────┘          │
//! │                                  │                    │
//! │              feed ──▶ SampleQueue ──▶ fetch           │
//! │                       (per session)                   │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use wake_listener::engine::{DetectionEngine, EngineConfig, RustpotterEngine};
//!
//! let engine = RustpotterEngine::new();
//! let config = EngineConfig {
//!     model_paths: vec!["models/alexa.rpw".into()],
//!     ..EngineConfig::default()
//! };
//! let session = engine.create_session(&config).expect("model not found — download one first");
//!
//! let chunk = engine.feed_chunk_size(&session);
//! engine.feed(&session, &vec![0_i16; chunk]).unwrap();
//! let status = engine.fetch(&session).unwrap();
//! println!("{status:?}");
//! ```

pub mod detector;
pub mod model;
pub mod rustpotter;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use detector::{
    DetectionEngine, EngineConfig, EngineError, FetchStatus, Session, WakeEvent,
};
pub use model::{find_wakeword_by_id, ModelPaths, WakewordInfo, COMMUNITY_WAKEWORDS};
// `self::` disambiguates the module from the extern crate of the same name.
pub use self::rustpotter::RustpotterEngine;

// test-only re-export so the pipeline test modules can import MockEngine
// without `use wake_listener::engine::detector::MockEngine`.
#[cfg(test)]
pub use detector::MockEngine;
