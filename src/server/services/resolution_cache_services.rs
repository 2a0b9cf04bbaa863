use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::source::ResolvedSource;

pub type DynResolutionCacheService = Arc<dyn ResolutionCacheServiceTrait + Send + Sync>;

/// process memory only, dropping it at any point just means the next lookup re-resolves
pub trait ResolutionCacheServiceTrait {
    /// cached source for the key, expired entries count as a miss and get dropped
    fn get(&self, key: &str) -> Option<ResolvedSource>;

    /// stores a source, evicting the oldest insert once the capacity is reached
    fn insert(&self, key: &str, source: ResolvedSource);

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn clear(&self);
}

struct CacheEntry {
    source: ResolvedSource,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    // insertion order, front is the oldest
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

pub struct ResolutionCacheService {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl ResolutionCacheService {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
            ttl,
        }
    }

    // a panic while holding the lock can't leave the map half written, so a poisoned lock is
    // still usable
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResolutionCacheServiceTrait for ResolutionCacheService {
    fn get(&self, key: &str) -> Option<ResolvedSource> {
        let mut state = self.lock();

        let expired = match state.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                debug!("resolution cache HIT for {}", key);
                return Some(entry.source.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("resolution cache entry expired for {}", key);
            state.remove(key);
        }

        None
    }

    fn insert(&self, key: &str, source: ResolvedSource) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.lock();
        state.remove(key);

        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    debug!("resolution cache full, evicting {}", oldest);
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        state.order.push_back(key.to_string());
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                source,
                inserted_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }
}
