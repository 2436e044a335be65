// MIDI Recorder - Merges live input into a track's timeline
// Each recorded event produces a brand new Track; the caller publishes it with a swap

use crate::error::EngineResult;
use crate::midi::event::{MidiEvent, TrackEvent};
use crate::sequencer::timeline::{DEFAULT_TICKS_PER_BEAT, beats_to_ticks};
use crate::sequencer::track::Track;

/// Insert `event` at `at_absolute_ticks`, keeping the timeline time-ordered.
///
/// Events already at the same tick stay ahead of the new one.
pub fn record(track: &Track, event: MidiEvent, at_absolute_ticks: u64) -> EngineResult<Track> {
    let mut absolute = Vec::with_capacity(track.event_count() + 1);
    absolute.extend_from_slice(track.absolute_events());
    absolute.push(TrackEvent::new(at_absolute_ticks, event));
    absolute.sort_by_key(|e| e.time);

    let merged = Track::from_absolute_events(absolute, track.ticks_per_beat())?;
    Ok(match track.name() {
        Some(name) => merged.with_name(name),
        None => merged,
    })
}

/// Decides what live input gets persisted and where it lands in the loop
#[derive(Debug, Clone, Copy)]
pub struct Recorder {
    record_control_changes: bool,
}

impl Recorder {
    pub fn new(record_control_changes: bool) -> Self {
        Self {
            record_control_changes,
        }
    }

    /// Notes are always recorded; control changes only when enabled
    pub fn accepts(&self, event: &MidiEvent) -> bool {
        match event {
            MidiEvent::NoteOn { .. } | MidiEvent::NoteOff { .. } => true,
            MidiEvent::ControlChange { .. } => self.record_control_changes,
            _ => false,
        }
    }

    /// Record `event` captured at playhead `at_beats` into `current`.
    ///
    /// An empty slot gets a fresh track first. Returns `Ok(None)` when the
    /// event type is monitored only.
    pub fn capture(
        &self,
        current: Option<&Track>,
        event: MidiEvent,
        at_beats: f64,
        beats_per_loop: u32,
    ) -> EngineResult<Option<Track>> {
        if !self.accepts(&event) {
            return Ok(None);
        }

        let fresh;
        let track = match current {
            Some(track) => track,
            None => {
                fresh = Track::empty(DEFAULT_TICKS_PER_BEAT);
                &fresh
            }
        };

        let tpb = track.ticks_per_beat();
        let loop_ticks = beats_per_loop as u64 * tpb as u64;
        let ticks = beats_to_ticks(at_beats, tpb) % loop_ticks.max(1);

        log::debug!("Recording {:?} at tick {} ({} tpb)", event, ticks, tpb);
        record(track, event, ticks).map(Some)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(note: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            note,
            velocity: 100,
        }
    }

    #[test]
    fn test_record_into_middle() {
        let track = Track::from_absolute_events(
            vec![
                TrackEvent::new(0, note_on(60)),
                TrackEvent::new(960, MidiEvent::NoteOff { note: 60 }),
            ],
            480,
        )
        .unwrap();

        let recorded = record(&track, note_on(64), 480).unwrap();

        assert_eq!(recorded.event_count(), 3);
        let times: Vec<u64> = recorded.absolute_events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 480, 960]);
        // Delta view stays consistent with the absolute one
        let deltas: Vec<u64> = recorded.delta_events().iter().map(|e| e.time).collect();
        assert_eq!(deltas, vec![0, 480, 480]);
        // The source track is untouched
        assert_eq!(track.event_count(), 2);
    }

    #[test]
    fn test_record_same_tick_goes_last() {
        let track =
            Track::from_absolute_events(vec![TrackEvent::new(480, note_on(60))], 480).unwrap();

        let recorded = record(&track, MidiEvent::NoteOff { note: 72 }, 480).unwrap();

        assert_eq!(recorded.absolute_events()[0].event, note_on(60));
        assert_eq!(
            recorded.absolute_events()[1].event,
            MidiEvent::NoteOff { note: 72 }
        );
    }

    #[test]
    fn test_record_gets_new_version() {
        let track = Track::empty(480);
        let recorded = record(&track, note_on(60), 0).unwrap();

        assert_ne!(track.version(), recorded.version());
    }

    #[test]
    fn test_capture_creates_track_for_empty_slot() {
        let recorder = Recorder::default();
        let captured = recorder
            .capture(None, note_on(60), 2.0, 16)
            .unwrap()
            .unwrap();

        assert_eq!(captured.ticks_per_beat(), DEFAULT_TICKS_PER_BEAT);
        assert_eq!(captured.absolute_events()[0].time, 960);
    }

    #[test]
    fn test_capture_wraps_to_loop_length() {
        let recorder = Recorder::default();
        let track = Track::empty(96);
        let captured = recorder
            .capture(Some(&track), note_on(60), 17.5, 16)
            .unwrap()
            .unwrap();

        assert_eq!(captured.absolute_events()[0].time, 144);
    }

    #[test]
    fn test_capture_filters_control_changes() {
        let cc = MidiEvent::ControlChange {
            controller: 64,
            value: 127,
        };

        assert!(Recorder::new(false).capture(None, cc, 0.0, 16).unwrap().is_none());
        assert!(Recorder::new(true).capture(None, cc, 0.0, 16).unwrap().is_some());
        assert!(
            Recorder::new(true)
                .capture(None, MidiEvent::PitchBend { value: 0 }, 0.0, 16)
                .unwrap()
                .is_none()
        );
    }
}
