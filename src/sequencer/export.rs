// Pattern export - Decoded event lists handed to the file I/O layer
//
// Per-track export keeps the track's own resolution. Song export normalizes every
// slot to a common resolution and drops whatever lies past the end of the loop.

use crate::error::{EngineError, EngineResult};
use crate::midi::event::TrackEvent;
use crate::sequencer::quantizer::quantise;
use crate::sequencer::timeline::{QuantiseGrid, rescale_ticks, ticks_to_beats};
use crate::sequencer::track::{Track, absolute_to_delta};
use serde::{Deserialize, Serialize};

/// One exported lane: delta-time events at `ticks_per_beat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedTrack {
    pub name: String,
    pub ticks_per_beat: u32,
    pub events: Vec<TrackEvent>,
}

impl ExportedTrack {
    pub fn empty(name: impl Into<String>, ticks_per_beat: u32) -> Self {
        Self {
            name: name.into(),
            ticks_per_beat,
            events: Vec::new(),
        }
    }

    /// True if no note events were exported
    pub fn is_empty(&self) -> bool {
        !self.events.iter().any(|e| e.event.is_note())
    }

    /// Decode back into a `Track`
    pub fn to_track(&self) -> EngineResult<Track> {
        Ok(Track::from_delta_events(self.events.clone(), self.ticks_per_beat)?
            .with_name(self.name.clone()))
    }
}

/// All slots at a common resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSong {
    pub ticks_per_beat: u32,
    pub tracks: Vec<ExportedTrack>,
}

impl ExportedSong {
    pub fn to_json_string(&self) -> EngineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::MalformedEventSequence(format!("JSON encode: {}", e)))
    }

    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::MalformedEventSequence(format!("JSON decode: {}", e)))
    }
}

pub fn slot_name(slot: usize) -> String {
    format!("Track {}", slot)
}

/// Export one track at its own resolution with `grid` applied
pub fn export_track(track: &Track, grid: QuantiseGrid) -> EngineResult<ExportedTrack> {
    let quantised = quantise(track, grid)?;
    Ok(ExportedTrack {
        name: track.name().map(str::to_string).unwrap_or_default(),
        ticks_per_beat: quantised.ticks_per_beat(),
        events: quantised.delta_events().to_vec(),
    })
}

/// Export one slot of a song: quantise, truncate to `beats_per_loop`, then
/// resample to `export_ticks_per_beat`. Empty slots export as empty tracks.
pub fn export_song_track(
    slot: usize,
    track: Option<&Track>,
    grid: QuantiseGrid,
    beats_per_loop: u32,
    export_ticks_per_beat: u32,
) -> EngineResult<ExportedTrack> {
    let name = slot_name(slot);
    let track = match track {
        Some(track) if !track.is_empty() => track,
        _ => return Ok(ExportedTrack::empty(name, export_ticks_per_beat)),
    };

    let quantised = quantise(track, grid)?;
    let tpb = quantised.ticks_per_beat();
    let loop_beats = beats_per_loop as f64;

    let absolute: Vec<TrackEvent> = quantised
        .absolute_events()
        .iter()
        .take_while(|e| ticks_to_beats(e.time, tpb) <= loop_beats)
        .map(|e| e.with_time(rescale_ticks(e.time, tpb, export_ticks_per_beat)))
        .collect();

    let dropped = quantised.event_count() - absolute.len();
    if dropped > 0 {
        log::debug!(
            "{}: {} event(s) past beat {} not exported",
            name,
            dropped,
            beats_per_loop
        );
    }

    Ok(ExportedTrack {
        name,
        ticks_per_beat: export_ticks_per_beat,
        events: absolute_to_delta(&absolute)?,
    })
}
