// Lock-free communication channels

use crate::messaging::notification::Notification;
use crate::midi::event::MidiEvent;
use ringbuf::{HeapRb, traits::Split};

/// Device thread → engine: live MIDI input, drained once per tick
pub type InputProducer = ringbuf::HeapProd<MidiEvent>;
pub type InputConsumer = ringbuf::HeapCons<MidiEvent>;

pub fn create_input_channel(capacity: usize) -> (InputProducer, InputConsumer) {
    let rb = HeapRb::<MidiEvent>::new(capacity);
    rb.split()
}

/// Engine → UI: non-fatal failures and status messages
pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}
