//! Detect task — the sole reader of detection results.
//!
//! Polls the session and reacts to the three possible outcomes: nothing to
//! score yet (back off briefly so an idle engine does not starve the feed
//! task of CPU), a scored chunk with no activation (poll again immediately —
//! the engine rate-limits itself by only releasing full chunks), or a wake
//! activation (emit the event and keep listening; detection never pauses
//! capture).
//!
//! Per session the conceptual state machine is
//! `IDLE → LISTENING → WAKE_DETECTED → LISTENING`, with no terminal state
//! other than cooperative shutdown via the run flag.

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::engine::{DetectionEngine, FetchStatus, Session, WakeEvent};

use super::RunFlag;

/// Run the result loop until `run` is cleared.
///
/// Spawned by the controller on the dedicated `wake-detect` thread.  Send
/// errors on `events` are ignored — a departed subscriber is not a reason to
/// stop listening.
pub(crate) fn detect_loop(
    engine: Arc<dyn DetectionEngine>,
    session: Arc<Session>,
    run: RunFlag,
    events: mpsc::Sender<WakeEvent>,
    backoff: Duration,
) {
    log::debug!("detect: started (backoff {backoff:?})");

    while run.load(Ordering::Relaxed) {
        match engine.fetch(&session) {
            Ok(FetchStatus::Detected(event)) => {
                log::info!(
                    "detect: wake word detected (model {}, keyword {})",
                    event.model_index,
                    event.keyword_index
                );
                let _ = events.send(event);
            }
            Ok(FetchStatus::Listening) => {
                // Chunk scored, nothing matched — poll again right away.
            }
            Ok(FetchStatus::NotReady) => std::thread::sleep(backoff),
            Err(e) => {
                log::debug!("detect: fetch failed: {e}");
                std::thread::sleep(backoff);
            }
        }
    }

    log::debug!("detect: run flag cleared, exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EngineError, MockEngine};
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    fn spawn_detect(
        engine: &Arc<MockEngine>,
        backoff: Duration,
    ) -> (
        RunFlag,
        mpsc::Receiver<WakeEvent>,
        std::thread::JoinHandle<()>,
    ) {
        let session = Arc::new(engine.create_session(&EngineConfig::default()).unwrap());
        let run: RunFlag = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let dyn_engine: Arc<dyn DetectionEngine> = engine.clone();
        let run_clone = Arc::clone(&run);
        let handle = std::thread::spawn(move || {
            detect_loop(dyn_engine, session, run_clone, tx, backoff);
        });
        (run, rx, handle)
    }

    // ---- Event emission ----------------------------------------------------

    #[test]
    fn two_failures_then_wake_emits_exactly_one_event() {
        let backoff = Duration::from_millis(5);
        let engine = Arc::new(MockEngine::with_script(
            4,
            vec![
                Err(EngineError::Fetch("busy".into())),
                Err(EngineError::Fetch("busy".into())),
                Ok(FetchStatus::Detected(WakeEvent {
                    model_index: 0,
                    keyword_index: 2,
                })),
            ],
        ));

        let started = Instant::now();
        let (run, rx, handle) = spawn_detect(&engine, backoff);

        let event = rx.recv_timeout(Duration::from_secs(2)).expect("wake event");
        assert_eq!(event.model_index, 0);
        assert_eq!(event.keyword_index, 2);
        // Two failed fetches each cost one backoff delay before the hit.
        assert!(started.elapsed() >= backoff * 2);

        run.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(rx.try_recv().is_err(), "exactly one event expected");
    }

    #[test]
    fn listening_results_do_not_emit_events() {
        let engine = Arc::new(MockEngine::with_script(
            4,
            vec![Ok(FetchStatus::Listening), Ok(FetchStatus::Listening)],
        ));
        let (run, rx, handle) = spawn_detect(&engine, Duration::from_millis(1));

        std::thread::sleep(Duration::from_millis(20));
        run.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(rx.try_recv().is_err());
        assert!(engine.fetch_calls() >= 2, "loop must keep polling");
    }

    #[test]
    fn detection_resumes_listening_afterwards() {
        let engine = Arc::new(MockEngine::with_script(
            4,
            vec![
                Ok(FetchStatus::Detected(WakeEvent {
                    model_index: 1,
                    keyword_index: 0,
                })),
                Ok(FetchStatus::Listening),
            ],
        ));
        let (run, rx, handle) = spawn_detect(&engine, Duration::from_millis(1));

        let event = rx.recv_timeout(Duration::from_secs(2)).expect("wake event");
        assert_eq!(event.model_index, 1);

        // The loop keeps fetching after the hit (script → Listening → NotReady).
        std::thread::sleep(Duration::from_millis(20));
        run.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(engine.fetch_calls() >= 2);
    }

    #[test]
    fn dropped_receiver_does_not_stop_the_loop() {
        let engine = Arc::new(MockEngine::with_script(
            4,
            vec![Ok(FetchStatus::Detected(WakeEvent {
                model_index: 0,
                keyword_index: 0,
            }))],
        ));
        let (run, rx, handle) = spawn_detect(&engine, Duration::from_millis(1));
        drop(rx);

        std::thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished(), "loop must survive a departed subscriber");

        run.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }

    // ---- Backoff pacing ----------------------------------------------------

    #[test]
    fn failed_fetches_are_rate_limited_by_the_backoff() {
        let backoff = Duration::from_millis(10);
        // Empty script → every fetch returns NotReady.
        let engine = Arc::new(MockEngine::new(4));
        let (run, _rx, handle) = spawn_detect(&engine, backoff);

        std::thread::sleep(Duration::from_millis(100));
        run.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        let calls = engine.fetch_calls();
        assert!(calls >= 2, "loop must keep retrying, got {calls}");
        // 100 ms / 10 ms backoff ≈ 10 polls; generous ceiling for slow CI.
        assert!(calls <= 30, "polling faster than the backoff allows: {calls}");
    }
}
