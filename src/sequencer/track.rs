// Track - One lane of the loop: an ordered MIDI event timeline plus derived views
//
// Storage follows the MIDI file convention (delta times). The absolute-time view
// is computed once when the track is built, so scheduling and merging never see
// a partially converted sequence.

use crate::error::{EngineError, EngineResult};
use crate::midi::event::{MetaKind, MidiEvent, TrackEvent};
use crate::sequencer::timeline::{DEFAULT_TICKS_PER_BEAT, QuantiseGrid, ticks_to_beats};
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimum pitch span reported by `lowest_note`/`highest_note`
const MIN_DISPLAY_SPAN: i16 = 12;

/// Global track version generator (atomic for thread-safety)
static NEXT_TRACK_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_track_version() -> u64 {
    NEXT_TRACK_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Prefix-sum a delta-time sequence into absolute time
pub fn delta_to_absolute(events: &[TrackEvent]) -> Vec<TrackEvent> {
    let mut acc_ticks = 0u64;
    events
        .iter()
        .map(|e| {
            acc_ticks = acc_ticks.saturating_add(e.time);
            e.with_time(acc_ticks)
        })
        .collect()
}

/// Difference an absolute-time sequence back into delta time.
///
/// Fails if the sequence is not time-ordered, since that would need a
/// negative delta.
pub fn absolute_to_delta(events: &[TrackEvent]) -> EngineResult<Vec<TrackEvent>> {
    let mut prev_time = 0u64;
    let mut delta = Vec::with_capacity(events.len());

    for (index, e) in events.iter().enumerate() {
        if e.time < prev_time {
            return Err(EngineError::MalformedEventSequence(format!(
                "event {} at tick {} precedes previous event at tick {}",
                index, e.time, prev_time
            )));
        }
        delta.push(e.with_time(e.time - prev_time));
        prev_time = e.time;
    }

    Ok(delta)
}

/// A closed note-on/note-off pair, in beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub start: f64,
    pub duration: f64,
    pub pitch: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlChangePoint {
    pub controller: u8,
    pub value: u8,
    pub ticks: u64,
    pub beat: f64,
}

/// An immutable track value.
///
/// Every edit builds a new `Track` (with a new `version`) that is then
/// published by swapping it into its slot.
#[derive(Debug, Clone)]
pub struct Track {
    name: Option<String>,
    ticks_per_beat: u32,
    version: u64,
    events: Vec<TrackEvent>,
    absolute: Vec<TrackEvent>,
    notes: Vec<Note>,
    control_changes: Vec<ControlChangePoint>,
    lowest_note: u8,
    highest_note: u8,
    end_of_track: Option<f64>,
    unterminated_notes: usize,
}

impl Track {
    /// Build from a delta-time sequence (storage / file order)
    pub fn from_delta_events(events: Vec<TrackEvent>, ticks_per_beat: u32) -> EngineResult<Self> {
        let absolute = delta_to_absolute(&events);
        Self::build(events, absolute, ticks_per_beat)
    }

    /// Build from an absolute-time sequence. Rejects unsorted input.
    pub fn from_absolute_events(
        absolute: Vec<TrackEvent>,
        ticks_per_beat: u32,
    ) -> EngineResult<Self> {
        let events = absolute_to_delta(&absolute)?;
        Self::build(events, absolute, ticks_per_beat)
    }

    /// A track with no events
    pub fn empty(ticks_per_beat: u32) -> Self {
        Self::build(Vec::new(), Vec::new(), ticks_per_beat.max(1))
            .unwrap_or_else(|_| unreachable!("resolution is clamped to at least 1"))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn build(
        events: Vec<TrackEvent>,
        absolute: Vec<TrackEvent>,
        ticks_per_beat: u32,
    ) -> EngineResult<Self> {
        if ticks_per_beat == 0 {
            return Err(EngineError::MalformedEventSequence(
                "ticks per beat must be > 0".to_string(),
            ));
        }

        let mut track = Self {
            name: None,
            ticks_per_beat,
            version: next_track_version(),
            events,
            absolute,
            notes: Vec::new(),
            control_changes: Vec::new(),
            lowest_note: 0,
            highest_note: 127,
            end_of_track: None,
            unterminated_notes: 0,
        };
        track.derive_views();
        Ok(track)
    }

    /// Recompute notes, control changes, pitch range and end-of-track marker
    fn derive_views(&mut self) {
        let tpb = self.ticks_per_beat;
        let mut open_notes: Vec<(u8, u8, f64)> = Vec::new(); // (pitch, velocity, start)

        for e in &self.absolute {
            let beat = ticks_to_beats(e.time, tpb);

            match e.event {
                MidiEvent::Meta(MetaKind::EndOfTrack) => {
                    self.end_of_track = Some(beat);
                }
                event if event.is_note_on() => {
                    if let MidiEvent::NoteOn { note, velocity } = event {
                        open_notes.push((note, velocity, beat));
                    }
                }
                event if event.is_note_off() => {
                    // Oldest open note of the same pitch; stray note-offs are ignored
                    let pitch = event.note();
                    if let Some(index) = open_notes.iter().position(|n| Some(n.0) == pitch) {
                        let (pitch, velocity, start) = open_notes.remove(index);
                        self.notes.push(Note {
                            start,
                            duration: beat - start,
                            pitch,
                            velocity,
                        });
                    }
                }
                MidiEvent::ControlChange { controller, value } => {
                    self.control_changes.push(ControlChangePoint {
                        controller,
                        value,
                        ticks: e.time,
                        beat,
                    });
                }
                _ => {}
            }
        }

        // Unterminated notes are dropped from the note list
        self.unterminated_notes = open_notes.len();
        if self.unterminated_notes > 0 {
            log::debug!(
                "Track has {} unterminated note(s), excluded from notes",
                self.unterminated_notes
            );
        }

        let (mut lowest, mut highest) = match (
            self.notes.iter().map(|n| n.pitch).min(),
            self.notes.iter().map(|n| n.pitch).max(),
        ) {
            (Some(lo), Some(hi)) => (lo as i16, hi as i16),
            _ => (0, 127),
        };

        let span = highest - lowest;
        if span < MIN_DISPLAY_SPAN {
            let pad = MIN_DISPLAY_SPAN - span;
            lowest = (lowest - pad).max(0);
            highest = (highest + pad).min(127);
        }

        self.lowest_note = lowest as u8;
        self.highest_note = highest as u8;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    /// Process-unique identity of this event sequence
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Events in storage order with delta times
    pub fn delta_events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Events in storage order with absolute times
    pub fn absolute_events(&self) -> &[TrackEvent] {
        &self.absolute
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Absolute beat position of the event at `index`
    pub fn beat_at(&self, index: usize) -> f64 {
        ticks_to_beats(self.absolute[index].time, self.ticks_per_beat)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn control_changes(&self) -> &[ControlChangePoint] {
        &self.control_changes
    }

    pub fn lowest_note(&self) -> u8 {
        self.lowest_note
    }

    pub fn highest_note(&self) -> u8 {
        self.highest_note
    }

    pub fn end_of_track(&self) -> Option<f64> {
        self.end_of_track
    }

    /// Note-ons that never received a matching note-off
    pub fn unterminated_notes(&self) -> usize {
        self.unterminated_notes
    }

    /// A track is empty when it holds no note events (meta/CC only counts as empty)
    pub fn is_empty(&self) -> bool {
        !self.events.iter().any(|e| e.event.is_note())
    }

    /// Notes with starts snapped to `grid`, for display
    pub fn display_notes(&self, grid: QuantiseGrid) -> Vec<Note> {
        let Some(step) = grid.step_beats() else {
            return self.notes.clone();
        };
        self.notes
            .iter()
            .map(|n| Note {
                start: (n.start / step).round() * step,
                ..*n
            })
            .collect()
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::empty(DEFAULT_TICKS_PER_BEAT)
    }
}

impl PartialEq for Track {
    /// Content equality; `version` is identity and deliberately not compared
    fn eq(&self, other: &Self) -> bool {
        self.ticks_per_beat == other.ticks_per_beat
            && self.name == other.name
            && self.events == other.events
    }
}
