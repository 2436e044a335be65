// MIDI Input - Device connection feeding the engine's input queue
//
// The midir callback runs on its own thread; it only decodes and pushes. The
// engine drains the queue on its next tick.

use crate::messaging::channels::InputProducer;
use crate::midi::event::MidiEvent;
use midir::{MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::Producer;

pub struct MidiInput {
    port_name: Option<String>,
    _connection: Option<MidiInputConnection<()>>,
}

impl MidiInput {
    /// Connect to the first available input port.
    ///
    /// No device is not an error: the looper keeps running without live input.
    pub fn connect_first(mut input_tx: InputProducer) -> Result<Self, String> {
        let midi_in = MidirInput::new("MIDI Looper Input")
            .map_err(|e| format!("MIDI init error: {}", e))?;

        let ports = midi_in.ports();
        if ports.is_empty() {
            log::warn!("No MIDI port detected, running without live input");
            return Ok(Self {
                port_name: None,
                _connection: None,
            });
        }

        for (i, port) in ports.iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                log::info!("MIDI port [{}] {}", i, name);
            }
        }

        let port = &ports[0];
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "midi-looper-input",
                move |_timestamp, message, _| {
                    if let Some(event) = MidiEvent::from_bytes(message) {
                        // try_push never blocks the device thread
                        if input_tx.try_push(event).is_err() {
                            log::warn!("MIDI input queue full, {:?} dropped", event);
                        }
                    }
                },
                (),
            )
            .map_err(|e| format!("MIDI connection failed: {}", e))?;

        log::info!("Connected to MIDI port: {}", port_name);

        Ok(Self {
            port_name: Some(port_name),
            _connection: Some(connection),
        })
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self._connection.is_some()
    }
}
