use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::store::SessionStore;
use super::ConversationState;

struct Entry {
    state: ConversationState,
    touched: Instant,
}

/// In-memory session store with an explicit idle-timeout eviction policy.
///
/// Entries are dropped lazily: a stale entry found by `get`/`contains` is
/// removed on the spot, and `evict_idle` sweeps the whole map so long-silent
/// users don't accumulate forever.
pub struct InMemorySessionStore {
    entries: DashMap<String, Entry>,
    idle_ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    fn is_stale(&self, entry: &Entry) -> bool {
        entry.touched.elapsed() > self.idle_ttl
    }

    #[cfg(test)]
    fn backdate(&self, user_id: &str, age: Duration) {
        if let Some(mut entry) = self.entries.get_mut(user_id) {
            entry.touched = Instant::now() - age;
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: &str) -> Option<ConversationState> {
        if let Some(entry) = self.entries.get(user_id) {
            if !self.is_stale(&entry) {
                return Some(entry.state.clone());
            }
        }
        // Stale entry: drop it outside the read guard.
        self.entries
            .remove_if(user_id, |_, entry| self.is_stale(entry));
        None
    }

    fn put(&self, state: ConversationState) {
        self.entries.insert(
            state.user_id.clone(),
            Entry {
                state,
                touched: Instant::now(),
            },
        );
    }

    fn remove(&self, user_id: &str) -> bool {
        self.entries.remove(user_id).is_some()
    }

    fn contains(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }

    fn evict_idle(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_stale(entry));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_put_get_remove() {
        let store = store();
        store.put(ConversationState::new("u1", Phase::AwaitingName));

        let state = store.get("u1").unwrap();
        assert_eq!(state.phase, Phase::AwaitingName);
        assert!(store.contains("u1"));

        assert!(store.remove("u1"));
        assert!(!store.remove("u1"));
        assert!(store.get("u1").is_none());
    }

    #[test]
    fn test_stale_entry_dropped_on_get() {
        let store = store();
        store.put(ConversationState::new("u1", Phase::Idle));
        store.backdate("u1", Duration::from_secs(7200));

        assert!(store.get("u1").is_none());
        assert!(!store.contains("u1"));
    }

    #[test]
    fn test_evict_idle_sweeps_only_stale() {
        let store = store();
        store.put(ConversationState::new("old", Phase::Idle));
        store.put(ConversationState::new("fresh", Phase::Idle));
        store.backdate("old", Duration::from_secs(7200));

        assert_eq!(store.evict_idle(), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_put_refreshes_idle_clock() {
        let store = store();
        store.put(ConversationState::new("u1", Phase::Idle));
        store.backdate("u1", Duration::from_secs(7200));
        store.put(ConversationState::new("u1", Phase::AwaitingEmail));

        assert_eq!(store.get("u1").unwrap().phase, Phase::AwaitingEmail);
    }
}
