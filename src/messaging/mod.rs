// Messaging - queues between the device thread, the tick driver and the UI

pub mod channels;
pub mod notification;
