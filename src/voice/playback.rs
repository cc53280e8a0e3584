//! Speech output with last-call-wins semantics
//!
//! The platform speech engine only exposes a coarse "is speaking" flag, so
//! completion is detected by polling. A speaking indicator stays on for the
//! whole burst of back-to-back utterances and is cleared once, when the most
//! recent utterance finishes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Result;

/// Text-to-speech capability
pub trait SpeechEngine: Send + Sync {
    /// Start speaking; returns once playback has been queued
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the utterance
    fn speak(&self, text: &str) -> Result<()>;

    /// Stop any current and queued speech
    fn cancel(&self);

    /// Whether audio is currently playing
    fn is_speaking(&self) -> bool;
}

/// Visible "assistant is speaking" state
pub trait PlaybackIndicator: Send + Sync {
    fn set_playing(&self, playing: bool);
}

/// Indicator that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl PlaybackIndicator for NoIndicator {
    fn set_playing(&self, _playing: bool) {}
}

/// Callback run when an utterance finishes without being preempted
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    id: u64,
    playing: bool,
    watcher: Option<JoinHandle<()>>,
}

const MIN_POLL: Duration = Duration::from_millis(1);

struct Inner {
    engine: Arc<dyn SpeechEngine>,
    indicator: Arc<dyn PlaybackIndicator>,
    poll_interval: Duration,
    idle_reads: u32,
    job: Mutex<Job>,
}

impl Inner {
    fn job(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializes speech requests; a new request cancels the previous one
#[derive(Clone)]
pub struct SpeechCoordinator {
    inner: Arc<Inner>,
}

impl SpeechCoordinator {
    /// Create a coordinator
    ///
    /// `idle_reads` consecutive idle polls are required before an utterance
    /// counts as finished (at least one). The poll interval is at least 1 ms.
    #[must_use]
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        indicator: Arc<dyn PlaybackIndicator>,
        poll_interval: Duration,
        idle_reads: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                indicator,
                poll_interval: poll_interval.max(MIN_POLL),
                idle_reads: idle_reads.max(1),
                job: Mutex::new(Job {
                    id: 0,
                    playing: false,
                    watcher: None,
                }),
            }),
        }
    }

    /// Speak `text`, cancelling whatever is playing
    ///
    /// `on_done` runs after this utterance finishes, unless a later call
    /// preempts it. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the utterance; the indicator is
    /// cleared in that case
    pub fn speak(&self, text: &str, on_done: Option<Completion>) -> Result<()> {
        let id = {
            let mut job = self.inner.job();
            if let Some(watcher) = job.watcher.take() {
                watcher.abort();
            }
            self.inner.engine.cancel();
            job.id += 1;
            if !job.playing {
                job.playing = true;
                self.inner.indicator.set_playing(true);
            }
            job.id
        };

        tracing::debug!(job = id, chars = text.len(), "speaking");

        if let Err(e) = self.inner.engine.speak(text) {
            tracing::warn!(error = %e, "speech engine rejected utterance");
            let mut job = self.inner.job();
            if job.id == id && job.playing {
                job.playing = false;
                self.inner.indicator.set_playing(false);
            }
            return Err(e);
        }

        let watcher = tokio::spawn(watch_completion(Arc::clone(&self.inner), id, on_done));

        let mut job = self.inner.job();
        if job.id == id {
            job.watcher = Some(watcher);
        } else {
            // Preempted while starting
            watcher.abort();
        }
        Ok(())
    }

    /// Cancel speech and clear the indicator
    pub fn stop(&self) {
        let mut job = self.inner.job();
        if let Some(watcher) = job.watcher.take() {
            watcher.abort();
        }
        job.id += 1;
        self.inner.engine.cancel();
        if job.playing {
            job.playing = false;
            self.inner.indicator.set_playing(false);
        }
    }

    /// Whether the indicator is currently on
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.inner.job().playing
    }
}

async fn watch_completion(inner: Arc<Inner>, id: u64, on_done: Option<Completion>) {
    let mut ticker = tokio::time::interval(inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    let mut idle = 0;
    while idle < inner.idle_reads {
        ticker.tick().await;
        if inner.engine.is_speaking() {
            idle = 0;
        } else {
            idle += 1;
        }
    }

    {
        let mut job = inner.job();
        if job.id != id {
            return;
        }
        job.watcher = None;
        job.playing = false;
        inner.indicator.set_playing(false);
    }

    tracing::debug!(job = id, "speech finished");

    if let Some(on_done) = on_done {
        on_done();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::time::{Instant, sleep};

    use super::*;

    /// Speaks for 100ms per character after a fixed startup lag
    struct FakeEngine {
        lag: Duration,
        window: Mutex<Option<(Instant, Instant)>>,
    }

    impl FakeEngine {
        fn new(lag: Duration) -> Arc<Self> {
            Arc::new(Self {
                lag,
                window: Mutex::new(None),
            })
        }
    }

    impl SpeechEngine for FakeEngine {
        fn speak(&self, text: &str) -> Result<()> {
            let start = Instant::now() + self.lag;
            let chars = u32::try_from(text.len()).unwrap();
            *self.window.lock().unwrap() = Some((start, start + Duration::from_millis(100) * chars));
            Ok(())
        }

        fn cancel(&self) {
            *self.window.lock().unwrap() = None;
        }

        fn is_speaking(&self) -> bool {
            let now = Instant::now();
            self.window
                .lock()
                .unwrap()
                .is_some_and(|(start, end)| now >= start && now < end)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<bool>>);

    impl PlaybackIndicator for Recorder {
        fn set_playing(&self, playing: bool) {
            self.0.lock().unwrap().push(playing);
        }
    }

    impl Recorder {
        fn history(&self) -> Vec<bool> {
            self.0.lock().unwrap().clone()
        }
    }

    fn coordinator(engine: Arc<FakeEngine>, recorder: &Arc<Recorder>) -> SpeechCoordinator {
        SpeechCoordinator::new(
            engine,
            Arc::clone(recorder) as Arc<dyn PlaybackIndicator>,
            Duration::from_millis(250),
            2,
        )
    }

    fn flag() -> (Arc<AtomicBool>, Completion) {
        let flag = Arc::new(AtomicBool::new(false));
        let set = Arc::clone(&flag);
        (flag, Box::new(move || set.store(true, Ordering::SeqCst)))
    }

    #[tokio::test(start_paused = true)]
    async fn later_call_wins_and_indicator_toggles_once() {
        let recorder = Arc::new(Recorder::default());
        let speech = coordinator(FakeEngine::new(Duration::ZERO), &recorder);

        let (first_done, first_cb) = flag();
        let (second_done, second_cb) = flag();

        speech.speak("hello", Some(first_cb)).unwrap();
        sleep(Duration::from_millis(100)).await;
        speech.speak("how are you", Some(second_cb)).unwrap();

        sleep(Duration::from_millis(600)).await;
        assert_eq!(recorder.history(), [true]);
        assert!(speech.is_playing());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.history(), [true, false]);
        assert!(!first_done.load(Ordering::SeqCst));
        assert!(second_done.load(Ordering::SeqCst));
        assert!(!speech.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn startup_lag_does_not_end_utterance_early() {
        let recorder = Arc::new(Recorder::default());
        let speech = coordinator(FakeEngine::new(Duration::from_millis(300)), &recorder);

        speech.speak("ten chars!", None).unwrap();

        // First poll at 250ms sees silence, second sees speech
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(recorder.history(), [true]);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(recorder.history(), [true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_still_completes() {
        let recorder = Arc::new(Recorder::default());
        let speech = SpeechCoordinator::new(
            FakeEngine::new(Duration::ZERO),
            Arc::clone(&recorder) as Arc<dyn PlaybackIndicator>,
            Duration::ZERO,
            2,
        );
        let (done, cb) = flag();

        speech.speak("hi", Some(cb)).unwrap();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(recorder.history(), [true, false]);
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_indicator_and_drops_callback() {
        let recorder = Arc::new(Recorder::default());
        let speech = coordinator(FakeEngine::new(Duration::ZERO), &recorder);
        let (done, cb) = flag();

        speech.speak("hello", Some(cb)).unwrap();
        speech.stop();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(recorder.history(), [true, false]);
        assert!(!done.load(Ordering::SeqCst));
    }
}
