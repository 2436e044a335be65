// Timeline - Musical time conversions
// Handles conversion between wall-clock seconds, beats and MIDI ticks

use std::fmt;

/// Default MIDI resolution (pulses per quarter note), used for new tracks and export
pub const DEFAULT_TICKS_PER_BEAT: u32 = 480;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (20.0..=999.0).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Beats elapsed over `seconds` of wall-clock time
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds / 60.0 * self.bpm
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.beat_duration_seconds()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Quantise grid: `divisions` equal steps every `beats` beats.
///
/// `per_beat(4)` snaps to sixteenths, `every_beats(4)` to every fourth beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantiseGrid {
    pub divisions: u32,
    pub beats: u32,
}

impl QuantiseGrid {
    pub const OFF: Self = Self {
        divisions: 0,
        beats: 1,
    };

    pub fn per_beat(divisions: u32) -> Self {
        Self {
            divisions,
            beats: 1,
        }
    }

    pub fn every_beats(beats: u32) -> Self {
        Self { divisions: 1, beats }
    }

    pub fn is_off(&self) -> bool {
        self.divisions == 0 || self.beats == 0
    }

    /// Grid spacing in beats
    pub fn step_beats(&self) -> Option<f64> {
        (!self.is_off()).then(|| self.beats as f64 / self.divisions as f64)
    }
}

impl Default for QuantiseGrid {
    fn default() -> Self {
        Self::OFF
    }
}

impl fmt::Display for QuantiseGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_off() {
            write!(f, "off")
        } else {
            write!(f, "{}/{}", self.divisions, self.beats)
        }
    }
}

/// Tick position to beats at the given resolution
pub fn ticks_to_beats(ticks: u64, ticks_per_beat: u32) -> f64 {
    ticks as f64 / ticks_per_beat as f64
}

/// Beat position to ticks, truncating toward the earlier tick
pub fn beats_to_ticks(beats: f64, ticks_per_beat: u32) -> u64 {
    (beats * ticks_per_beat as f64).max(0.0) as u64
}

/// Resample a tick position from one resolution to another, rounding to nearest
pub fn rescale_ticks(ticks: u64, from_ticks_per_beat: u32, to_ticks_per_beat: u32) -> u64 {
    if from_ticks_per_beat == to_ticks_per_beat {
        return ticks;
    }
    let scaled = ticks as u128 * to_ticks_per_beat as u128;
    let from = from_ticks_per_beat as u128;
    ((scaled + from / 2) / from) as u64
}
