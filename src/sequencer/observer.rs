// Transport observers - Callbacks fired synchronously by the engine
//
// All methods default to no-ops so an observer only implements what it needs.

use crate::sequencer::track::Track;
use std::sync::Arc;

pub trait TransportObserver: Send {
    /// Playhead moved (fired every tick while playing, and on reset)
    fn on_playhead_changed(&mut self, _beat_position: f64) {}

    /// A new integer beat was reached
    fn on_beat(&mut self, _beat_number: u64) {}

    /// The playhead wrapped; `loop_count` is the count before the increment
    fn on_loop(&mut self, _loop_count: u64) {}

    /// A slot was replaced, recorded into, or emptied
    fn on_track_changed(&mut self, _track: Option<Arc<Track>>, _slot: usize) {}

    /// The active slot changed (`None` = no active track)
    fn on_active_track_changed(&mut self, _track: Option<Arc<Track>>, _slot: Option<usize>) {}
}

/// Fan-out to every subscribed observer
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn TransportObserver>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn TransportObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn playhead_changed(&mut self, beat_position: f64) {
        for o in &mut self.observers {
            o.on_playhead_changed(beat_position);
        }
    }

    pub fn beat(&mut self, beat_number: u64) {
        for o in &mut self.observers {
            o.on_beat(beat_number);
        }
    }

    pub fn looped(&mut self, loop_count: u64) {
        for o in &mut self.observers {
            o.on_loop(loop_count);
        }
    }

    pub fn track_changed(&mut self, track: Option<Arc<Track>>, slot: usize) {
        for o in &mut self.observers {
            o.on_track_changed(track.clone(), slot);
        }
    }

    pub fn active_track_changed(&mut self, track: Option<Arc<Track>>, slot: Option<usize>) {
        for o in &mut self.observers {
            o.on_active_track_changed(track.clone(), slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct BeatCounter(Arc<Mutex<Vec<u64>>>);

    impl TransportObserver for BeatCounter {
        fn on_beat(&mut self, beat_number: u64) {
            self.0.lock().unwrap().push(beat_number);
        }
    }

    #[test]
    fn test_every_subscriber_is_notified() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let mut list = ObserverList::new();
        list.subscribe(Box::new(BeatCounter(first.clone())));
        list.subscribe(Box::new(BeatCounter(second.clone())));
        assert_eq!(list.len(), 2);

        list.beat(3);
        // Unimplemented callbacks are no-ops
        list.looped(0);
        list.playhead_changed(1.5);

        assert_eq!(*first.lock().unwrap(), vec![3]);
        assert_eq!(*second.lock().unwrap(), vec![3]);
    }
}
