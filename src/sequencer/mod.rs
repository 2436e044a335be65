// Sequencer module
// Track timelines, the loop transport and everything the tick drives

pub mod engine;
pub mod export;
pub mod metronome;
pub mod observer;
pub mod quantizer;
pub mod recorder;
pub mod scheduler;
pub mod store;
pub mod timeline;
pub mod track;
pub mod transport;

pub use engine::LoopEngine;
pub use metronome::{ClickSink, ClickType, Metronome};
pub use observer::TransportObserver;
pub use quantizer::quantise;
pub use recorder::{Recorder, record};
pub use scheduler::{BeatWindow, EventScheduler, events_in_window};
pub use store::TrackStore;
pub use timeline::{DEFAULT_TICKS_PER_BEAT, QuantiseGrid, Tempo};
pub use track::{ControlChangePoint, Note, Track, absolute_to_delta, delta_to_absolute};
pub use transport::{Clock, ManualClock, SharedTransportState, SystemClock, TransportState};
