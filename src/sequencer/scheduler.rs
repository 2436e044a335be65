// Event Scheduler - Selects the track events due in a slice of beat time
//
// Each slot keeps a cursor into its track so a tick only touches the events in
// its own window. The cursor is re-seeked whenever continuity is broken: a new
// track version, a window that starts before the previous one ended (loop wrap
// or seek), or an explicit reset.

use crate::midi::event::TrackEvent;
use crate::sequencer::timeline::ticks_to_beats;
use crate::sequencer::track::Track;

/// Half-open window `[start, end)` in beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatWindow {
    pub start: f64,
    pub end: f64,
}

impl BeatWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, beat: f64) -> bool {
        beat >= self.start && beat < self.end
    }

    pub fn width(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Windows swept by a playhead moving from `from` to `to`. When the move
    /// wrapped, the sweep is split at the loop seam into `[from, +inf)` and
    /// `[0, to)`, so events at or past the loop end are swept before the seam.
    pub fn sweep(from: f64, to: f64, wrapped: bool) -> (Self, Option<Self>) {
        if wrapped {
            (Self::new(from, f64::INFINITY), Some(Self::new(0.0, to)))
        } else {
            (Self::new(from, to), None)
        }
    }
}

/// Pure query: events whose absolute beat lies in `window`, in track order.
/// Stops scanning at the first event past the window.
pub fn events_in_window(track: &Track, window: BeatWindow) -> Vec<TrackEvent> {
    let mut due = Vec::new();
    for (index, e) in track.absolute_events().iter().enumerate() {
        let beat = track.beat_at(index);
        if beat >= window.end {
            break;
        }
        if beat >= window.start {
            due.push(*e);
        }
    }
    due
}

/// Per-slot resume point
#[derive(Debug, Clone, Copy, Default)]
struct ScheduleCursor {
    armed: bool,
    track_version: u64,
    next_index: usize,
    position: f64,
}

/// Cursor-based scheduler for a fixed number of slots
#[derive(Debug, Clone)]
pub struct EventScheduler {
    cursors: Vec<ScheduleCursor>,
}

impl EventScheduler {
    pub fn new(slot_count: usize) -> Self {
        Self {
            cursors: vec![ScheduleCursor::default(); slot_count],
        }
    }

    /// Append the events of `track` due in `window` to `out`.
    pub fn collect_due(
        &mut self,
        slot: usize,
        track: &Track,
        window: BeatWindow,
        out: &mut Vec<TrackEvent>,
    ) {
        let Some(cursor) = self.cursors.get_mut(slot) else {
            return;
        };

        let events = track.absolute_events();

        if !cursor.armed || cursor.track_version != track.version() || window.start < cursor.position
        {
            let tpb = track.ticks_per_beat();
            cursor.next_index =
                events.partition_point(|e| ticks_to_beats(e.time, tpb) < window.start);
            cursor.track_version = track.version();
            cursor.armed = true;
        }

        let mut index = cursor.next_index;
        while index < events.len() {
            let beat = track.beat_at(index);
            if beat >= window.end {
                break;
            }
            if beat >= window.start {
                out.push(events[index]);
            }
            index += 1;
        }

        cursor.next_index = index;
        cursor.position = window.end;
    }

    /// Forget every cursor (seek, playhead reset)
    pub fn reset(&mut self) {
        for cursor in &mut self.cursors {
            cursor.armed = false;
        }
    }

    /// Forget one slot's cursor (track replaced or deleted)
    pub fn reset_slot(&mut self, slot: usize) {
        if let Some(cursor) = self.cursors.get_mut(slot) {
            cursor.armed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::MidiEvent;

    fn track_with_beats(beats: &[f64]) -> Track {
        let events = beats
            .iter()
            .enumerate()
            .map(|(i, b)| {
                TrackEvent::new(
                    (b * 480.0) as u64,
                    MidiEvent::NoteOn {
                        note: 60 + i as u8,
                        velocity: 100,
                    },
                )
            })
            .collect();
        Track::from_absolute_events(events, 480).unwrap()
    }

    fn notes(events: &[TrackEvent]) -> Vec<u8> {
        events.iter().filter_map(|e| e.event.note()).collect()
    }

    #[test]
    fn test_window_contains_half_open() {
        let window = BeatWindow::new(1.0, 2.0);

        assert!(window.contains(1.0));
        assert!(window.contains(1.999));
        assert!(!window.contains(2.0));
        assert!(!window.contains(0.999));
    }

    #[test]
    fn test_sweep_splits_on_wrap() {
        let (first, second) = BeatWindow::sweep(15.9, 0.1, true);

        assert_eq!(first, BeatWindow::new(15.9, f64::INFINITY));
        assert!(first.contains(16.0));
        assert_eq!(second, Some(BeatWindow::new(0.0, 0.1)));

        let (only, none) = BeatWindow::sweep(1.0, 1.5, false);
        assert_eq!(only, BeatWindow::new(1.0, 1.5));
        assert!(none.is_none());
    }

    #[test]
    fn test_events_in_window() {
        let track = track_with_beats(&[0.0, 1.0, 1.0, 2.0, 3.0]);
        let due = events_in_window(&track, BeatWindow::new(1.0, 3.0));

        // Equal timestamps keep their track order
        assert_eq!(notes(&due), vec![61, 62, 63]);
    }

    #[test]
    fn test_zero_width_window() {
        let track = track_with_beats(&[1.0]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        scheduler.collect_due(0, &track, BeatWindow::new(1.0, 1.0), &mut out);
        assert!(out.is_empty());
        assert!(events_in_window(&track, BeatWindow::new(1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_consecutive_windows_fire_once() {
        let track = track_with_beats(&[0.0, 0.5, 1.0, 1.5, 2.0]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        let mut start = 0.0;
        for step in 1..=30 {
            let end = step as f64 * 0.1;
            scheduler.collect_due(0, &track, BeatWindow::new(start, end), &mut out);
            start = end;
        }

        assert_eq!(notes(&out), vec![60, 61, 62, 63, 64]);
    }

    #[test]
    fn test_wrap_reseeks_cursor() {
        let track = track_with_beats(&[0.0, 3.5]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        scheduler.collect_due(0, &track, BeatWindow::new(0.0, 3.0), &mut out);
        scheduler.collect_due(0, &track, BeatWindow::new(3.0, 4.0), &mut out);
        // Second pass through the loop
        scheduler.collect_due(0, &track, BeatWindow::new(0.0, 1.0), &mut out);

        assert_eq!(notes(&out), vec![60, 61, 60]);
    }

    #[test]
    fn test_wrap_sweeps_events_at_loop_end() {
        let track = track_with_beats(&[3.0, 4.0]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        let (first, second) = BeatWindow::sweep(3.5, 0.25, true);
        scheduler.collect_due(0, &track, BeatWindow::new(2.5, 3.5), &mut out);
        scheduler.collect_due(0, &track, first, &mut out);
        if let Some(second) = second {
            scheduler.collect_due(0, &track, second, &mut out);
        }

        assert_eq!(notes(&out), vec![60, 61]);
    }

    #[test]
    fn test_new_track_version_reseeks() {
        let original = track_with_beats(&[0.5, 2.5]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        scheduler.collect_due(0, &original, BeatWindow::new(0.0, 1.0), &mut out);

        // Track replaced mid-loop with an event inserted before the cursor
        let replaced = track_with_beats(&[0.25, 0.75, 2.5]);
        scheduler.collect_due(0, &replaced, BeatWindow::new(1.0, 3.0), &mut out);

        assert_eq!(notes(&out), vec![60, 62]);
    }

    #[test]
    fn test_unknown_slot_is_ignored() {
        let track = track_with_beats(&[0.0]);
        let mut scheduler = EventScheduler::new(1);
        let mut out = Vec::new();

        scheduler.collect_due(5, &track, BeatWindow::new(0.0, 1.0), &mut out);
        assert!(out.is_empty());
    }
}
