// Transport - Playback state and the wall clock that drives it
// Play/stop plus an orthogonal record flag, mirrored into atomics for other threads

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }

    pub fn toggled(self) -> Self {
        match self {
            TransportState::Stopped => TransportState::Playing,
            TransportState::Playing => TransportState::Stopped,
        }
    }
}

/// Shared transport state
/// Thread-safe via atomics so render/UI threads can read without touching the engine
#[derive(Debug, Default)]
pub struct SharedTransportState {
    playing: AtomicBool,
    recording: AtomicBool,
    playhead_bits: AtomicU64,
    loop_count: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Relaxed) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Playhead in beats, in `[0, beats_per_loop)`
    pub fn playhead(&self) -> f64 {
        f64::from_bits(self.playhead_bits.load(Ordering::Relaxed))
    }

    pub fn loop_count(&self) -> u64 {
        self.loop_count.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, state: TransportState) {
        self.playing.store(state.is_playing(), Ordering::Relaxed);
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Relaxed);
    }

    pub(crate) fn set_playhead(&self, beats: f64) {
        self.playhead_bits.store(beats.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_loop_count(&self, count: u64) {
        self.loop_count.store(count, Ordering::Relaxed);
    }
}

/// Monotonic time source, in seconds since an arbitrary origin
pub trait Clock: Send {
    fn now_seconds(&self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tick sequences.
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.advance_seconds(by.as_secs_f64());
    }

    pub fn advance_seconds(&self, seconds: f64) {
        let now = self.now_seconds();
        self.set(now + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
    }
}
