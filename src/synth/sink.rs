// Synth sink - The sound-producing collaborator the engine dispatches to
//
// Channels are slot indices. Every call may fail; the engine logs failures and
// carries on.

use crate::error::SinkError;
use std::sync::{Arc, Mutex};

pub type SinkResult = Result<(), SinkError>;

/// MIDI channel volume controller, used for mute/solo/volume
pub const CC_CHANNEL_VOLUME: u8 = 7;

pub trait SynthSink: Send {
    fn note_on(&mut self, channel: usize, note: u8, velocity: u8) -> SinkResult;
    fn note_off(&mut self, channel: usize, note: u8) -> SinkResult;
    fn control_change(&mut self, channel: usize, controller: u8, value: u8) -> SinkResult;
    /// Raw 14-bit bend, centre 8192
    fn pitch_bend(&mut self, channel: usize, value: i16) -> SinkResult;
    fn all_notes_off(&mut self, channel: usize) -> SinkResult;
    fn program_select(&mut self, channel: usize, sound_id: u32, bank: u32, program: u8)
    -> SinkResult;
}

/// Sink that only logs, for running without a synthesizer
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSynth;

impl SynthSink for LoggingSynth {
    fn note_on(&mut self, channel: usize, note: u8, velocity: u8) -> SinkResult {
        log::info!("[ch {}] note on {} vel {}", channel, note, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: usize, note: u8) -> SinkResult {
        log::info!("[ch {}] note off {}", channel, note);
        Ok(())
    }

    fn control_change(&mut self, channel: usize, controller: u8, value: u8) -> SinkResult {
        log::debug!("[ch {}] cc {} = {}", channel, controller, value);
        Ok(())
    }

    fn pitch_bend(&mut self, channel: usize, value: i16) -> SinkResult {
        log::debug!("[ch {}] pitch bend {}", channel, value);
        Ok(())
    }

    fn all_notes_off(&mut self, channel: usize) -> SinkResult {
        log::debug!("[ch {}] all notes off", channel);
        Ok(())
    }

    fn program_select(
        &mut self,
        channel: usize,
        sound_id: u32,
        bank: u32,
        program: u8,
    ) -> SinkResult {
        log::info!(
            "[ch {}] program select sound {} bank {} program {}",
            channel,
            sound_id,
            bank,
            program
        );
        Ok(())
    }
}

/// One call received by a `RecordingSynth`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthCall {
    NoteOn { channel: usize, note: u8, velocity: u8 },
    NoteOff { channel: usize, note: u8 },
    ControlChange { channel: usize, controller: u8, value: u8 },
    PitchBend { channel: usize, value: i16 },
    AllNotesOff { channel: usize },
    ProgramSelect { channel: usize, sound_id: u32, bank: u32, program: u8 },
}

/// Sink that stores every call in a shared log. Clones share the log, so a
/// caller can hand one clone to the engine and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynth {
    calls: Arc<Mutex<Vec<SynthCall>>>,
    fail: bool,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every call and then reports failure
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<SynthCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn note_calls(&self) -> Vec<SynthCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, SynthCall::NoteOn { .. } | SynthCall::NoteOff { .. }))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn push(&mut self, call: SynthCall) -> SinkResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.fail {
            Err(SinkError(format!("rejected {:?}", call)))
        } else {
            Ok(())
        }
    }
}

impl SynthSink for RecordingSynth {
    fn note_on(&mut self, channel: usize, note: u8, velocity: u8) -> SinkResult {
        self.push(SynthCall::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    fn note_off(&mut self, channel: usize, note: u8) -> SinkResult {
        self.push(SynthCall::NoteOff { channel, note })
    }

    fn control_change(&mut self, channel: usize, controller: u8, value: u8) -> SinkResult {
        self.push(SynthCall::ControlChange {
            channel,
            controller,
            value,
        })
    }

    fn pitch_bend(&mut self, channel: usize, value: i16) -> SinkResult {
        self.push(SynthCall::PitchBend { channel, value })
    }

    fn all_notes_off(&mut self, channel: usize) -> SinkResult {
        self.push(SynthCall::AllNotesOff { channel })
    }

    fn program_select(
        &mut self,
        channel: usize,
        sound_id: u32,
        bank: u32,
        program: u8,
    ) -> SinkResult {
        self.push(SynthCall::ProgramSelect {
            channel,
            sound_id,
            bank,
            program,
        })
    }
}
