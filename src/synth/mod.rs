// Synth - The sound-producing side of the engine

pub mod sink;

pub use sink::{LoggingSynth, RecordingSynth, SynthCall, SynthSink};
