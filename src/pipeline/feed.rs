//! Feed task — the sole writer into the engine's ingestion path.
//!
//! Pulls raw 32-bit audio from the [`AudioSource`] one chunk at a time,
//! reduces it to 16-bit and feeds the valid prefix into the session.  The
//! loop holds two scratch buffers for its whole lifetime; nothing is
//! allocated per iteration.
//!
//! Truncated and empty reads are routine (the source times out, the bus
//! hiccups): only the samples actually read are converted and fed, and a
//! zero-sample round just loops.  Read *errors* are absorbed the same way —
//! always-on capture must not alarm on transient underruns — but they are
//! counted and surfaced as a rate-limited warning so a dead source is
//! visible in the logs.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{reduce_bit_depth, AudioSource};
use crate::engine::{DetectionEngine, Session};

use super::RunFlag;

/// Pacing delay after a failed read.  A timed-out read paces itself through
/// the source's own timeout; an erroring source would otherwise spin.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Emit one warning per this many consecutive read errors.
const ERROR_LOG_EVERY: u64 = 100;

/// Run the capture loop until `run` is cleared.
///
/// Spawned by the controller on the dedicated `wake-feed` thread.  Aborts
/// before feeding anything if the engine reports a zero chunk size.
pub(crate) fn feed_loop(
    mut source: Box<dyn AudioSource + Send>,
    engine: Arc<dyn DetectionEngine>,
    session: Arc<Session>,
    run: RunFlag,
) {
    let chunk_size = engine.feed_chunk_size(&session);
    if chunk_size == 0 {
        log::error!("feed: engine reported a zero feed chunk size, aborting");
        return;
    }

    // Scratch buffers for the whole task lifetime; sized together so the
    // valid prefix of `raw` always fits in `converted`.
    let mut raw = vec![0_i32; chunk_size];
    let mut converted = vec![0_i16; chunk_size];
    let mut consecutive_errors: u64 = 0;

    log::debug!("feed: started (chunk size {chunk_size})");

    while run.load(Ordering::Relaxed) {
        let samples_read = match source.read(&mut raw) {
            Ok(n) => {
                consecutive_errors = 0;
                n
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors % ERROR_LOG_EVERY == 1 {
                    log::warn!("feed: read failed ({consecutive_errors} consecutive): {e}");
                }
                std::thread::sleep(READ_ERROR_BACKOFF);
                0
            }
        };

        // No data this round — skip feeding rather than pushing stale
        // scratch contents downstream.
        if samples_read == 0 {
            continue;
        }

        let n = reduce_bit_depth(&raw[..samples_read], &mut converted[..samples_read]);
        if let Err(e) = engine.feed(&session, &converted[..n]) {
            log::warn!("feed: engine rejected chunk: {e}");
        }
    }

    log::debug!("feed: run flag cleared, exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
