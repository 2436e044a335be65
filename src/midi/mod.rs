// MIDI - Event types and live device input

pub mod event;
pub mod input;
