// Track store - Fixed array of slots, each holding at most one published Track
//
// Readers load a slot without locking. Writers build the replacement track on
// the side and publish it with one swap; a per-slot mutex orders concurrent
// writers so a read-modify-write never loses an update.

use crate::error::{EngineError, EngineResult};
use crate::sequencer::track::Track;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};

pub struct TrackStore {
    slots: Vec<ArcSwapOption<Track>>,
    write_locks: Vec<Mutex<()>>,
}

impl TrackStore {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count).map(|_| ArcSwapOption::empty()).collect(),
            write_locks: (0..slot_count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn check_slot(&self, slot: usize) -> EngineResult<()> {
        if slot < self.slots.len() {
            Ok(())
        } else {
            Err(EngineError::InvalidSlotIndex {
                index: slot,
                track_count: self.slots.len(),
            })
        }
    }

    /// Current track in `slot` (None for an empty or unknown slot)
    pub fn load(&self, slot: usize) -> Option<Arc<Track>> {
        self.slots.get(slot).and_then(|cell| cell.load_full())
    }

    /// Every slot, in order
    pub fn snapshot(&self) -> Vec<Option<Arc<Track>>> {
        self.slots.iter().map(|cell| cell.load_full()).collect()
    }

    /// Replace a slot wholesale
    pub fn store(&self, slot: usize, track: Option<Arc<Track>>) -> EngineResult<()> {
        self.check_slot(slot)?;
        let _guard = self.lock_slot(slot);
        self.slots[slot].store(track);
        Ok(())
    }

    /// Read-modify-write a slot.
    ///
    /// `edit` sees the current track and returns its replacement, or `Ok(None)`
    /// to leave the slot as it is. On error the slot is untouched.
    pub fn update<F>(&self, slot: usize, edit: F) -> EngineResult<Option<Arc<Track>>>
    where
        F: FnOnce(Option<&Track>) -> EngineResult<Option<Track>>,
    {
        self.check_slot(slot)?;
        let _guard = self.lock_slot(slot);

        let current = self.slots[slot].load_full();
        match edit(current.as_deref())? {
            Some(track) => {
                let published = Arc::new(track);
                self.slots[slot].store(Some(published.clone()));
                Ok(Some(published))
            }
            None => Ok(None),
        }
    }

    fn lock_slot(&self, slot: usize) -> std::sync::MutexGuard<'_, ()> {
        // Guarded data is (), nothing to recover
        self.write_locks[slot]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for TrackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let versions: Vec<Option<u64>> = self
            .slots
            .iter()
            .map(|cell| cell.load_full().map(|t| t.version()))
            .collect();
        f.debug_struct("TrackStore")
            .field("versions", &versions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::MidiEvent;
    use crate::sequencer::recorder::record;
    use std::thread;

    #[test]
    fn test_store_and_load() {
        let store = TrackStore::new(2);
        assert!(store.load(0).is_none());

        store.store(0, Some(Arc::new(Track::empty(480)))).unwrap();
        assert!(store.load(0).is_some());
        assert!(store.load(1).is_none());
        assert!(store.load(9).is_none());
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_invalid_slot_rejected() {
        let store = TrackStore::new(2);

        assert_eq!(
            store.store(2, None),
            Err(EngineError::InvalidSlotIndex {
                index: 2,
                track_count: 2
            })
        );
        assert!(store.update(5, |_| Ok(None)).is_err());
    }

    #[test]
    fn test_failed_update_keeps_previous_track() {
        let store = TrackStore::new(1);
        let original = Arc::new(Track::empty(480));
        store.store(0, Some(original.clone())).unwrap();

        let result = store.update(0, |_| {
            Err(EngineError::MalformedEventSequence("bad".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.load(0).unwrap().version(), original.version());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(TrackStore::new(1));
        store.store(0, Some(Arc::new(Track::empty(480)))).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..25u64 {
                        store
                            .update(0, |current| {
                                let current = current.cloned().unwrap_or_default();
                                let event = MidiEvent::NoteOn {
                                    note: 60 + w as u8,
                                    velocity: 100,
                                };
                                record(&current, event, i * 10).map(Some)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        // Reader sees only complete, ordered sequences
        for _ in 0..100 {
            if let Some(track) = store.load(0) {
                let times: Vec<u64> = track.absolute_events().iter().map(|e| e.time).collect();
                assert!(times.windows(2).all(|w| w[0] <= w[1]));
            }
        }

        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(store.load(0).unwrap().event_count(), 100);
    }
}
