//! Microphone input via `cpal`, behind the [`AudioSource`] seam.
//!
//! The pipeline only ever sees [`AudioSource`]: a blocking read that fills a
//! caller-owned buffer with full-scale signed 32-bit samples and reports how
//! many were actually delivered.  The hardware paces delivery, so blocking
//! with a bounded timeout is the expected behaviour; a timeout surfaces as
//! `Ok(0)` ("no data this round"), never as an error.
//!
//! [`CpalCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`CpalCapture::start`] to begin streaming: the cpal callback normalises
//! the device's native format to `i32` and forwards chunks over an mpsc
//! channel to the returned [`CpalSource`].  The returned [`StreamHandle`] is
//! a RAII guard — dropping it stops the underlying cpal stream.  The guard
//! stays on the spawning thread (`cpal::Stream` is not `Send`); only the
//! channel-reading [`CpalSource`] moves into the feed task.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Blocking source of raw interleaved 32-bit samples.
///
/// # Contract
///
/// - `read` blocks until samples arrive or an internal timeout elapses.
/// - It may fill fewer samples than `buf.len()` (truncated frame); callers
///   must use the returned count and never assume the whole buffer is valid.
/// - `Ok(0)` means "no data this round" and is routine, not a failure.
/// - Samples are full-scale signed 32-bit integers, interleaved by channel.
pub trait AudioSource: Send {
    /// Read up to `buf.len()` samples into `buf`; returns the number read.
    fn read(&mut self, buf: &mut [i32]) -> Result<usize, SourceError>;
}

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running audio capture.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported input sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("audio stream closed (capture side dropped)")]
    StreamClosed,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value drops the underlying `cpal::Stream`, which stops the
/// hardware stream.  Keep it on the thread that called
/// [`CpalCapture::start`].
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use wake_listener::audio::CpalCapture;
///
/// let capture = CpalCapture::new().unwrap();
/// let (source, _handle) = capture.start(Duration::from_millis(100)).unwrap();
/// // `_handle` keeps the stream alive; `source` moves into the feed task.
/// ```
pub struct CpalCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl CpalCapture {
    /// Create a new [`CpalCapture`] using the system default input device.
    ///
    /// Queries the device's preferred stream configuration (sample rate,
    /// channels, sample format) so no manual configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoDevice`] when no input device is available,
    /// or [`SourceError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new() -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(SourceError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_format,
            sample_rate,
            channels,
        })
    }

    /// Start the stream and return the reading half plus the RAII guard.
    ///
    /// The cpal callback runs on a dedicated audio thread; each hardware
    /// buffer is normalised to full-scale `i32` and forwarded over the
    /// channel.  Send errors (reader dropped) are silently ignored so the
    /// audio thread never panics.
    ///
    /// `read_timeout` bounds how long [`CpalSource::read`] blocks waiting
    /// for the next hardware buffer — and therefore how long a cooperative
    /// shutdown can take to be observed by the feed task.
    ///
    /// # Errors
    ///
    /// [`SourceError::UnsupportedFormat`] if the device delivers a sample
    /// format other than f32 / i16 / i32, or [`SourceError::BuildStream`] /
    /// [`SourceError::PlayStream`] if the platform rejects the stream.
    pub fn start(&self, read_timeout: Duration) -> Result<(CpalSource, StreamHandle), SourceError> {
        let (tx, rx) = mpsc::channel::<Vec<i32>>();

        let err_fn = |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let chunk: Vec<i32> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32)
                        .collect();
                    let _ = tx.send(chunk);
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let chunk: Vec<i32> = data.iter().map(|&s| (s as i32) << 16).collect();
                    let _ = tx.send(chunk);
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => self.device.build_input_stream(
                &self.config,
                move |data: &[i32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                err_fn,
                None,
            )?,
            other => return Err(SourceError::UnsupportedFormat(other)),
        };

        stream.play()?;

        let source = CpalSource {
            rx,
            pending: VecDeque::new(),
            read_timeout,
        };

        Ok((source, StreamHandle { _stream: stream }))
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in the captured audio.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// CpalSource
// ---------------------------------------------------------------------------

/// The reading half of a cpal capture stream.
///
/// Owns the receiving end of the callback channel plus a carry-over buffer
/// for samples that did not fit the caller's buffer on a previous read.
/// `Send`, unlike the stream itself, so it can move into the feed task.
pub struct CpalSource {
    rx: Receiver<Vec<i32>>,
    pending: VecDeque<i32>,
    read_timeout: Duration,
}

impl CpalSource {
    /// Move carried-over samples into `buf`, starting at `filled`.
    fn drain_pending(&mut self, buf: &mut [i32], mut filled: usize) -> usize {
        while filled < buf.len() {
            match self.pending.pop_front() {
                Some(sample) => {
                    buf[filled] = sample;
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }
}

impl AudioSource for CpalSource {
    fn read(&mut self, buf: &mut [i32]) -> Result<usize, SourceError> {
        let mut filled = self.drain_pending(buf, 0);

        // Block for the next hardware buffer only when we have nothing at
        // all; a timeout is the routine "no data this round" case.
        if filled == 0 {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(SourceError::StreamClosed),
            }
            filled = self.drain_pending(buf, 0);
        }

        // Top up opportunistically without blocking again.  Stopping short
        // is fine — the caller handles truncated frames.
        while filled < buf.len() {
            match self.rx.try_recv() {
                Ok(chunk) => {
                    self.pending.extend(chunk);
                    filled = self.drain_pending(buf, filled);
                }
                Err(_) => break,
            }
        }

        Ok(filled)
    }
}

// ---------------------------------------------------------------------------
// MockSource  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a scripted sequence of read outcomes.
///
/// Once the script is exhausted it keeps returning `Ok(0)` with a short
/// sleep (standing in for the hardware read timeout), so loops built on it
/// idle instead of spinning.
#[cfg(test)]
pub struct MockSource {
    script: VecDeque<MockRead>,
    /// Cleared when the script runs out — lets a test stop the feed loop
    /// exactly after the scripted reads have been consumed.
    clear_on_exhausted: Option<crate::pipeline::RunFlag>,
    /// Number of `read` calls observed.
    pub calls: usize,
}

/// One scripted outcome for [`MockSource::read`].
#[cfg(test)]
pub enum MockRead {
    /// Deliver these samples (possibly fewer than the buffer holds).
    Samples(Vec<i32>),
    /// A zero-sample read (timeout / underrun).
    Empty,
    /// A transient read failure.
    Error,
}

#[cfg(test)]
impl MockSource {
    pub fn new(script: Vec<MockRead>) -> Self {
        Self {
            script: script.into(),
            clear_on_exhausted: None,
            calls: 0,
        }
    }

    /// Clear `flag` once the script is exhausted.
    pub fn clear_when_done(mut self, flag: crate::pipeline::RunFlag) -> Self {
        self.clear_on_exhausted = Some(flag);
        self
    }
}

#[cfg(test)]
impl AudioSource for MockSource {
    fn read(&mut self, buf: &mut [i32]) -> Result<usize, SourceError> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(MockRead::Samples(samples)) => {
                let n = samples.len().min(buf.len());
                buf[..n].copy_from_slice(&samples[..n]);
                Ok(n)
            }
            Some(MockRead::Empty) => Ok(0),
            Some(MockRead::Error) => Err(SourceError::StreamClosed),
            None => {
                if let Some(flag) = &self.clear_on_exhausted {
                    flag.store(false, std::sync::atomic::Ordering::Relaxed);
                }
                std::thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
