//! In-memory idempotency store.
//!
//! Grounded on the teacher's `DedupeStore` (`gateway/src/api/inbound.rs`):
//! tracks seen event ids with a TTL so webhook retries and reconnect
//! replays never drive a second workflow step from the same message.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const CLEANUP_THRESHOLD: usize = 10_000;

pub struct DedupeStore {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl DedupeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns `true` if `event_id` was already seen within the TTL window
    /// (a duplicate), inserting/refreshing it either way.
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        let mut map = self.seen.lock();
        let now = Instant::now();

        if map.len() > CLEANUP_THRESHOLD {
            map.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        if let Some(ts) = map.get(event_id) {
            if now.duration_since(*ts) < self.ttl {
                return true;
            }
        }

        map.insert(event_id.to_string(), now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_insert_of_same_id_is_a_duplicate() {
        let store = DedupeStore::new(Duration::from_secs(60));
        assert!(!store.check_and_insert("evt-1"));
        assert!(store.check_and_insert("evt-1"));
    }

    #[test]
    fn distinct_ids_are_not_duplicates() {
        let store = DedupeStore::new(Duration::from_secs(60));
        assert!(!store.check_and_insert("evt-1"));
        assert!(!store.check_and_insert("evt-2"));
    }

    #[test]
    fn expired_entries_are_no_longer_duplicates() {
        let store = DedupeStore::new(Duration::from_millis(1));
        assert!(!store.check_and_insert("evt-1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!store.check_and_insert("evt-1"));
    }
}
