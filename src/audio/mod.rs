//! Audio front half of the pipeline — capture → bit-depth reduction → queue.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → i32 chunks (mpsc) → CpalSource::read
//!           → reduce_bit_depth (i32 → i16) → engine feed → SampleQueue
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wake_listener::audio::{AudioSource, CpalCapture};
//!
//! let capture = CpalCapture::new().unwrap();
//! let (mut source, _handle) = capture.start(Duration::from_millis(100)).unwrap();
//!
//! let mut raw = vec![0_i32; 512];
//! let n = source.read(&mut raw).unwrap(); // may be fewer than 512
//! println!("read {n} samples @ {} Hz", capture.sample_rate());
//! ```

pub mod convert;
pub mod queue;
pub mod source;

pub use convert::{reduce_bit_depth, SHIFT_BITS};
pub use queue::SampleQueue;
pub use source::{AudioSource, CpalCapture, CpalSource, SourceError, StreamHandle};

// test-only re-export so pipeline tests can import the scripted source
// without `use wake_listener::audio::source::MockSource`.
#[cfg(test)]
pub use source::{MockRead, MockSource};
