// Quantizer - Snap note starts to a beat grid while preserving durations

use crate::error::EngineResult;
use crate::midi::event::TrackEvent;
use crate::sequencer::timeline::QuantiseGrid;
use crate::sequencer::track::Track;

/// Snap an absolute tick position to the nearest point of `grid` (ties round
/// up). Integer arithmetic keeps the result stable when quantised twice.
pub fn snap_ticks(ticks: u64, ticks_per_beat: u32, grid: QuantiseGrid) -> u64 {
    if grid.is_off() {
        return ticks;
    }
    // Ticks covered by `grid.divisions` steps
    let span = ticks_per_beat as u128 * grid.beats as u128;
    let divisions = grid.divisions as u128;
    let step_index = (2 * ticks as u128 * divisions + span) / (2 * span);
    (step_index * span / divisions) as u64
}

/// Quantise an absolute-time sequence.
///
/// Each note-on moves to the grid; its note-off (oldest open note-on of the same
/// pitch) moves by the same amount. Note-offs with no open note-on are dropped.
/// Other events keep their time. The result is stably re-sorted by time.
pub fn quantise_events(
    absolute: &[TrackEvent],
    ticks_per_beat: u32,
    grid: QuantiseGrid,
) -> Vec<TrackEvent> {
    if grid.is_off() {
        return absolute.to_vec();
    }

    let mut open_notes: Vec<(u8, u64, u64)> = Vec::new(); // (pitch, original start, quantised start)
    let mut quantised = Vec::with_capacity(absolute.len());

    for e in absolute {
        if e.event.is_note_on() {
            let start = snap_ticks(e.time, ticks_per_beat, grid);
            if let Some(pitch) = e.event.note() {
                open_notes.push((pitch, e.time, start));
            }
            quantised.push(e.with_time(start));
        } else if e.event.is_note_off() {
            let pitch = e.event.note();
            if let Some(index) = open_notes.iter().position(|n| Some(n.0) == pitch) {
                let (_, original_start, start) = open_notes.remove(index);
                let duration = e.time - original_start;
                quantised.push(e.with_time(start + duration));
            }
        } else {
            quantised.push(*e);
        }
    }

    quantised.sort_by_key(|e| e.time);
    quantised
}

/// Quantise a track to `grid`. An off grid returns the track unchanged.
pub fn quantise(track: &Track, grid: QuantiseGrid) -> EngineResult<Track> {
    if grid.is_off() {
        return Ok(track.clone());
    }

    let events = quantise_events(track.absolute_events(), track.ticks_per_beat(), grid);
    let quantised = Track::from_absolute_events(events, track.ticks_per_beat())?;

    Ok(match track.name() {
        Some(name) => quantised.with_name(name),
        None => quantised,
    })
}
