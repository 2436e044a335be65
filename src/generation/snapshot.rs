// Pattern snapshot - What a generator is handed
//
// The piece is the whole song as exported event lists; the status tells the
// generator, per slot, whether to ignore it, use it as context, or rewrite it.

use crate::error::{EngineError, EngineResult};
use crate::sequencer::export::{ExportedTrack, export_song_track};
use crate::sequencer::timeline::QuantiseGrid;
use crate::sequencer::track::Track;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    pub ticks_per_beat: u32,
    pub beats_per_loop: u32,
    pub bars: usize,
    pub tracks: Vec<ExportedTrack>,
}

/// Per-slot instructions for the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPolicy {
    pub track_id: usize,
    pub ignore: bool,
    pub autoregressive: bool,
    pub selected_bars: Vec<bool>,
    pub temperature: f32,
}

impl TrackPolicy {
    /// Slot to be rewritten: every bar selected
    pub fn regenerate(track_id: usize, bars: usize) -> Self {
        Self {
            track_id,
            ignore: false,
            autoregressive: false,
            selected_bars: vec![true; bars],
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Slot the generator should not look at
    pub fn ignored(track_id: usize, bars: usize) -> Self {
        Self {
            ignore: true,
            selected_bars: vec![false; bars],
            ..Self::regenerate(track_id, bars)
        }
    }

    /// Slot kept as musical context
    pub fn context(track_id: usize, bars: usize) -> Self {
        Self {
            selected_bars: vec![false; bars],
            ..Self::regenerate(track_id, bars)
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected_bars.iter().any(|b| *b)
    }
}

/// Everything a generator needs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub piece: PatternSnapshot,
    pub status: Vec<TrackPolicy>,
}

impl GenerationRequest {
    pub fn piece_json(&self) -> EngineResult<String> {
        serde_json::to_string(&self.piece)
            .map_err(|e| EngineError::GenerationJobFailure(format!("encode piece: {}", e)))
    }

    pub fn status_json(&self) -> EngineResult<String> {
        serde_json::to_string(&self.status)
            .map_err(|e| EngineError::GenerationJobFailure(format!("encode status: {}", e)))
    }
}

/// Bars in one loop (at least one)
pub fn bar_count(beats_per_loop: u32, beats_per_bar: u32) -> usize {
    (beats_per_loop / beats_per_bar.max(1)).max(1) as usize
}

/// Derive the per-slot policy from mute state and the active slot
pub fn track_policies(
    slots: &[Option<Arc<Track>>],
    muted: &[bool],
    active: Option<usize>,
    bars: usize,
) -> Vec<TrackPolicy> {
    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let empty = slot.as_ref().is_none_or(|t| t.is_empty());
            let is_muted = muted.get(index).copied().unwrap_or(false);

            if active == Some(index) {
                TrackPolicy::regenerate(index, bars)
            } else if empty || is_muted {
                TrackPolicy::ignored(index, bars)
            } else {
                TrackPolicy::context(index, bars)
            }
        })
        .collect()
}

/// Snapshot the current pattern. Every slot is present, empty ones as empty tracks.
pub fn capture_pattern(
    slots: &[Option<Arc<Track>>],
    quantise: &[QuantiseGrid],
    beats_per_loop: u32,
    beats_per_bar: u32,
    ticks_per_beat: u32,
) -> EngineResult<PatternSnapshot> {
    let tracks = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            export_song_track(
                index,
                slot.as_deref(),
                quantise.get(index).copied().unwrap_or_default(),
                beats_per_loop,
                ticks_per_beat,
            )
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(PatternSnapshot {
        ticks_per_beat,
        beats_per_loop,
        bars: bar_count(beats_per_loop, beats_per_bar),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::{MidiEvent, TrackEvent};

    fn one_note_track() -> Arc<Track> {
        Arc::new(
            Track::from_absolute_events(
                vec![
                    TrackEvent::new(0, MidiEvent::NoteOn { note: 60, velocity: 100 }),
                    TrackEvent::new(480, MidiEvent::NoteOff { note: 60 }),
                ],
                480,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_bar_count() {
        assert_eq!(bar_count(16, 4), 4);
        assert_eq!(bar_count(6, 4), 1);
        assert_eq!(bar_count(2, 4), 1);
        assert_eq!(bar_count(12, 3), 4);
    }

    #[test]
    fn test_track_policies() {
        let slots = vec![
            Some(one_note_track()),
            Some(one_note_track()),
            None,
            Some(one_note_track()),
        ];
        let muted = vec![false, false, false, true];

        let policies = track_policies(&slots, &muted, Some(1), 4);

        // Non-empty, unmuted, inactive: context
        assert!(!policies[0].ignore);
        assert!(!policies[0].is_selected());
        // Active: every bar selected
        assert!(!policies[1].ignore);
        assert_eq!(policies[1].selected_bars, vec![true; 4]);
        // Empty and muted slots are ignored
        assert!(policies[2].ignore);
        assert!(policies[3].ignore);
        assert!(policies.iter().all(|p| p.temperature == DEFAULT_TEMPERATURE));
        assert!(policies.iter().all(|p| !p.autoregressive));
    }

    #[test]
    fn test_empty_active_slot_is_still_regenerated() {
        let policies = track_policies(&[None, None], &[false, false], Some(0), 2);

        assert!(!policies[0].ignore);
        assert!(policies[0].is_selected());
        assert!(policies[1].ignore);
    }

    #[test]
    fn test_capture_pattern_serializes() {
        let slots = vec![Some(one_note_track()), None];
        let piece = capture_pattern(&slots, &[QuantiseGrid::OFF; 2], 16, 4, 480).unwrap();

        assert_eq!(piece.tracks.len(), 2);
        assert_eq!(piece.bars, 4);
        assert!(piece.tracks[1].is_empty());

        let request = GenerationRequest {
            status: track_policies(&slots, &[false, false], Some(1), piece.bars),
            piece,
        };
        let json = request.piece_json().unwrap();
        assert!(json.contains("\"bars\":4"));
        let status: Vec<TrackPolicy> =
            serde_json::from_str(&request.status_json().unwrap()).unwrap();
        assert_eq!(status, request.status);
    }
}
