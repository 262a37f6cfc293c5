use crate::types::DetectedObject;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Latest decoded detections plus whether any message ever arrived.
///
/// Both fields sit behind one mutex so a reader never observes a detection
/// set together with a stale flag.
#[derive(Debug, Default)]
pub struct ObjectStore {
    inner: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    detections: Vec<DetectedObject>,
    ever_received: bool,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly decoded detection set. Never merges.
    pub fn replace(&self, detections: Vec<DetectedObject>) {
        let mut state = self.lock();
        state.detections = detections;
        state.ever_received = true;
    }

    /// Take the current detections, leaving the store empty. Each decoded
    /// set is handed out at most once.
    pub fn drain_and_clear(&self) -> Vec<DetectedObject> {
        std::mem::take(&mut self.lock().detections)
    }

    pub fn has_received_data(&self) -> bool {
        self.lock().ever_received
    }

    /// Forget everything, including that data was ever received.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.detections.clear();
        state.ever_received = false;
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn detection(label: &str, track_id: i64) -> DetectedObject {
        DetectedObject {
            label: label.to_string(),
            confidence: 0.9,
            x: 0.1,
            y: 0.1,
            width: 0.2,
            height: 0.2,
            track_id,
            ..Default::default()
        }
    }

    #[test]
    fn new_store_is_empty_and_unflagged() {
        let store = ObjectStore::new();
        assert!(!store.has_received_data());
        assert!(store.drain_and_clear().is_empty());
    }

    #[test]
    fn replace_sets_flag_and_detections() {
        let store = ObjectStore::new();
        store.replace(vec![detection("person", 1)]);

        assert!(store.has_received_data());
        assert_eq!(store.drain_and_clear(), vec![detection("person", 1)]);
    }

    #[test]
    fn replace_with_empty_set_still_flags() {
        let store = ObjectStore::new();
        store.replace(Vec::new());
        assert!(store.has_received_data());
    }

    #[test]
    fn replace_overwrites_instead_of_merging() {
        let store = ObjectStore::new();
        store.replace(vec![detection("person", 1), detection("car", 2)]);
        store.replace(vec![detection("dog", 3)]);

        assert_eq!(store.drain_and_clear(), vec![detection("dog", 3)]);
    }

    #[test]
    fn drain_hands_out_each_set_once() {
        let store = ObjectStore::new();
        store.replace(vec![detection("person", 1)]);

        assert_eq!(store.drain_and_clear().len(), 1);
        assert!(store.drain_and_clear().is_empty(), "Second drain must be empty");
        assert!(
            store.has_received_data(),
            "Draining must not reset the received flag"
        );
    }

    #[test]
    fn has_received_data_does_not_consume() {
        let store = ObjectStore::new();
        store.replace(vec![detection("person", 1)]);

        assert!(store.has_received_data());
        assert!(store.has_received_data());
        assert_eq!(store.drain_and_clear().len(), 1);
    }

    #[test]
    fn clear_resets_both_fields() {
        let store = ObjectStore::new();
        store.replace(vec![detection("person", 1)]);
        store.clear();

        assert!(!store.has_received_data());
        assert!(store.drain_and_clear().is_empty());
    }

    #[test]
    fn concurrent_readers_never_duplicate_a_set() {
        let store = Arc::new(ObjectStore::new());
        let rounds = 500;

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..rounds {
                    store.replace(vec![detection("person", i)]);
                    thread::yield_now();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    for _ in 0..rounds {
                        seen.extend(store.drain_and_clear().into_iter().map(|d| d.track_id));
                    }
                    seen
                })
            })
            .collect();

        writer.join().unwrap();
        let mut seen: Vec<i64> = readers
            .into_iter()
            .flat_map(|r| r.join().unwrap())
            .collect();
        seen.extend(store.drain_and_clear().into_iter().map(|d| d.track_id));

        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total, "A detection set was drained twice");
    }
}
