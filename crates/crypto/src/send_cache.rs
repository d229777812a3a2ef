//! Short-lived plaintext cache for messages sent from this session.
//!
//! Keyed by `(room, createdAt)` as stamped by the sending client. Lets the
//! pipeline show a just-sent message without unwrapping the sender's own
//! copy of the session key. Entries expire after a TTL, checked lazily on
//! access, and the least recently used entry is evicted once capacity is
//! reached.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hashlink::LruCache;
use sealtalk_shared::ids::RoomId;
use zeroize::Zeroizing;

type CacheKey = (RoomId, DateTime<Utc>);

struct CachedSend {
    plaintext: Zeroizing<String>,
    inserted_at: Instant,
}

pub struct SendCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<LruCache<CacheKey, CachedSend>>,
}

impl std::fmt::Debug for SendCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SendCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ttl,
            capacity,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // Every cache operation is a single call on the LRU, so a poisoned lock
    // never guards a half-updated cache.
    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CachedSend>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, room_id: RoomId, created_at: DateTime<Utc>, plaintext: &str) {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries.insert(
            (room_id, created_at),
            CachedSend {
                plaintext: Zeroizing::new(plaintext.to_string()),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Cached plaintext for a message sent in `room_id` at `created_at`.
    pub fn get(&self, room_id: &RoomId, created_at: &DateTime<Utc>) -> Option<String> {
        let key = (*room_id, *created_at);
        let mut entries = self.lock();
        let entry = entries.get(&key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            entries.remove(&key);
            return None;
        }
        Some(entry.plaintext.to_string())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry, e.g. on sign-out.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn evict_expired(&self, entries: &mut LruCache<CacheKey, CachedSend>) {
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            entries.remove(&key);
        }
    }
}
