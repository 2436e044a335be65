// MIDI Looper - Library exports for the binary, tests and benchmarks

pub mod config;
pub mod error;
pub mod generation;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, SinkError};
pub use messaging::channels::{create_input_channel, create_notification_channel};
pub use midi::event::{MetaKind, MidiEvent, TrackEvent};
pub use sequencer::export::{ExportedSong, ExportedTrack};
pub use sequencer::{
    ClickType, LoopEngine, ManualClock, Note, QuantiseGrid, Tempo, Track, TransportObserver,
    TransportState,
};
pub use synth::{LoggingSynth, RecordingSynth, SynthCall, SynthSink};
