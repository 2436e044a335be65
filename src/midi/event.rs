// MIDI event types shared by the input path, track storage and the scheduler

use serde::{Deserialize, Serialize};

/// Meta events carried inside a track (never sent to the synth)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaKind {
    EndOfTrack,
    SetTempo { micros_per_beat: u32 },
    TimeSignature { numerator: u8, denominator: u8 },
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
    PitchBend { value: i16 },
    Meta(MetaKind),
}

/// An event stamped with a tick time.
///
/// Whether `time` is a delta (ticks since the previous event) or an absolute
/// position (ticks since track start) depends on the sequence holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub time: u64,
    pub event: MidiEvent,
}

impl TrackEvent {
    pub fn new(time: u64, event: MidiEvent) -> Self {
        Self { time, event }
    }

    pub fn with_time(&self, time: u64) -> Self {
        Self {
            time,
            event: self.event,
        }
    }
}

impl MidiEvent {
    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        let status = bytes[0];
        let message_type = status & 0xF0;

        match message_type {
            0x90 => {
                if bytes.len() >= 3 {
                    let note = bytes[1];
                    let velocity = bytes[2];
                    // Velocity 0 = Note Off
                    if velocity == 0 {
                        Some(MidiEvent::NoteOff { note })
                    } else {
                        Some(MidiEvent::NoteOn { note, velocity })
                    }
                } else {
                    None
                }
            }
            0x80 => {
                if bytes.len() >= 3 {
                    Some(MidiEvent::NoteOff { note: bytes[1] })
                } else {
                    None
                }
            }
            0xB0 => {
                if bytes.len() >= 3 {
                    Some(MidiEvent::ControlChange {
                        controller: bytes[1],
                        value: bytes[2],
                    })
                } else {
                    None
                }
            }
            0xE0 => {
                if bytes.len() >= 3 {
                    let lsb = (bytes[1] & 0x7F) as i16;
                    let msb = (bytes[2] & 0x7F) as i16;
                    Some(MidiEvent::PitchBend {
                        value: (msb << 7) | lsb,
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Note-on with a non-zero velocity
    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { velocity, .. } if *velocity > 0)
    }

    /// Note-off, or the note-on-with-velocity-0 spelling of it
    pub fn is_note_off(&self) -> bool {
        matches!(
            self,
            MidiEvent::NoteOff { .. } | MidiEvent::NoteOn { velocity: 0, .. }
        )
    }

    pub fn is_note(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. } | MidiEvent::NoteOff { .. })
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, MidiEvent::Meta(_))
    }

    /// Pitch of a note event
    pub fn note(&self) -> Option<u8> {
        match self {
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note } => Some(*note),
            _ => None,
        }
    }

    /// Shift a note event by `semitones`.
    ///
    /// Returns `None` when the result falls outside 0..=127. Non-note events
    /// are returned unchanged.
    pub fn transposed(self, semitones: i8) -> Option<Self> {
        let shift = |note: u8| -> Option<u8> {
            let shifted = note as i16 + semitones as i16;
            (0..=127).contains(&shifted).then_some(shifted as u8)
        };

        match self {
            MidiEvent::NoteOn { note, velocity } => Some(MidiEvent::NoteOn {
                note: shift(note)?,
                velocity,
            }),
            MidiEvent::NoteOff { note } => Some(MidiEvent::NoteOff { note: shift(note)? }),
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let bytes = [0x90, 60, 100];
        let event = MidiEvent::from_bytes(&bytes).unwrap();

        assert_eq!(
            event,
            MidiEvent::NoteOn {
                note: 60,
                velocity: 100
            }
        );
    }

    #[test]
    fn test_note_off_velocity_zero() {
        let bytes = [0x90, 64, 0];
        let event = MidiEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, MidiEvent::NoteOff { note: 64 });
    }

    #[test]
    fn test_control_change() {
        let bytes = [0xB0, 7, 127];
        let event = MidiEvent::from_bytes(&bytes).unwrap();

        assert_eq!(
            event,
            MidiEvent::ControlChange {
                controller: 7,
                value: 127
            }
        );
    }

    #[test]
    fn test_pitch_bend_centre() {
        let bytes = [0xE0, 0x00, 0x40];
        let event = MidiEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, MidiEvent::PitchBend { value: 8192 });
    }

    #[test]
    fn test_invalid_messages() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0x90, 60]).is_none());
        assert!(MidiEvent::from_bytes(&[0xF0, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_midi_channel_ignored() {
        let event1 = MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap();
        let event2 = MidiEvent::from_bytes(&[0x9F, 60, 100]).unwrap();

        assert_eq!(event1, event2);
    }

    #[test]
    fn test_note_classification() {
        let on = MidiEvent::NoteOn {
            note: 60,
            velocity: 90,
        };
        let silent_on = MidiEvent::NoteOn {
            note: 60,
            velocity: 0,
        };

        assert!(on.is_note_on());
        assert!(!on.is_note_off());
        assert!(silent_on.is_note_off());
        assert!(!silent_on.is_note_on());
        assert!(MidiEvent::NoteOff { note: 60 }.is_note_off());
        assert!(!MidiEvent::Meta(MetaKind::EndOfTrack).is_note());
    }

    #[test]
    fn test_transpose_in_range() {
        let event = MidiEvent::NoteOn {
            note: 60,
            velocity: 100,
        };

        assert_eq!(
            event.transposed(12),
            Some(MidiEvent::NoteOn {
                note: 72,
                velocity: 100
            })
        );
        assert_eq!(
            MidiEvent::NoteOff { note: 60 }.transposed(-60),
            Some(MidiEvent::NoteOff { note: 0 })
        );
    }

    #[test]
    fn test_transpose_out_of_range() {
        let event = MidiEvent::NoteOn {
            note: 120,
            velocity: 100,
        };

        assert_eq!(event.transposed(8), None);
        assert_eq!(MidiEvent::NoteOff { note: 3 }.transposed(-4), None);
    }

    #[test]
    fn test_transpose_leaves_other_events() {
        let cc = MidiEvent::ControlChange {
            controller: 1,
            value: 64,
        };

        assert_eq!(cc.transposed(5), Some(cc));
    }
}
