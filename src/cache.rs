//! Content-addressed prompt cache for the AI review.
//!
//! Keys are `sha256(repository || prompt)` in hex, so identical prompts for
//! the same repository hit without storing prompt text. Capacity is bounded
//! in entries with least-recently-accessed eviction; `maintenance` evicts by
//! age. One lock guards the map and the recency order together, so the
//! reorder-on-hit and evict-on-insert steps are atomic for all callers.

use std::{
   collections::HashMap,
   time::{Duration, Instant},
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::api::Completion;

#[derive(Debug, Clone)]
struct CacheEntry {
   repository:  String,
   value:       Completion,
   inserted_at: Instant,
   /// The recency list is the authoritative LRU index; this timestamp is
   /// carried for debugging parity
   #[allow(dead_code, reason = "recency list drives eviction; timestamp kept for debugging")]
   accessed_at: Instant,
}

#[derive(Default)]
struct CacheStorage {
   entries:      HashMap<String, CacheEntry>,
   /// Recency order, least recently accessed first
   access_order: Vec<String>,
   hits:         u64,
   misses:       u64,
   evictions:    u64,
   expirations:  u64,
}

/// Counters and sizes for one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
   pub entries:      usize,
   pub repositories: usize,
   pub hits:         u64,
   pub misses:       u64,
   pub evictions:    u64,
   pub expirations:  u64,
}

pub struct PromptCache {
   storage:  Mutex<CacheStorage>,
   /// Total entry capacity across repositories; 0 means unbounded
   capacity: usize,
   /// Entry time-to-live for `maintenance`; `None` disables age eviction
   ttl:      Option<Duration>,
}

impl PromptCache {
   pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
      Self { storage: Mutex::new(CacheStorage::default()), capacity, ttl }
   }

   /// Look up a prior completion for this repository + prompt. A hit counts
   /// as an access and refreshes the entry's recency.
   pub fn get(&self, repository: &str, prompt: &str) -> Option<Completion> {
      let key = cache_key(repository, prompt);
      let mut storage = self.storage.lock();

      if let Some(entry) = storage.entries.get_mut(&key) {
         entry.accessed_at = Instant::now();
         let value = entry.value.clone();
         storage.access_order.retain(|k| k != &key);
         storage.access_order.push(key);
         storage.hits += 1;
         Some(value)
      } else {
         storage.misses += 1;
         None
      }
   }

   /// Store a completion, evicting the least recently accessed entry when
   /// the capacity would be exceeded.
   pub fn put(&self, repository: &str, prompt: &str, value: Completion) {
      let key = cache_key(repository, prompt);
      let now = Instant::now();
      let mut storage = self.storage.lock();

      if self.capacity > 0
         && storage.entries.len() >= self.capacity
         && !storage.entries.contains_key(&key)
      {
         if let Some(oldest) = storage.access_order.first().cloned() {
            storage.entries.remove(&oldest);
            storage.access_order.retain(|k| k != &oldest);
            storage.evictions += 1;
         }
      }

      storage.entries.insert(key.clone(), CacheEntry {
         repository:  repository.to_string(),
         value,
         inserted_at: now,
         accessed_at: now,
      });
      storage.access_order.retain(|k| k != &key);
      storage.access_order.push(key);
   }

   /// Drop every entry belonging to one repository.
   pub fn clear_repository(&self, repository: &str) {
      let mut storage = self.storage.lock();
      let doomed: Vec<String> = storage
         .entries
         .iter()
         .filter(|(_, entry)| entry.repository == repository)
         .map(|(key, _)| key.clone())
         .collect();

      for key in &doomed {
         storage.entries.remove(key);
      }
      storage.access_order.retain(|k| !doomed.contains(k));
   }

   /// Drop everything.
   pub fn clear_all(&self) {
      let mut storage = self.storage.lock();
      storage.entries.clear();
      storage.access_order.clear();
   }

   /// Evict entries older than the configured TTL. Returns how many were
   /// removed; a no-op without a TTL.
   pub fn maintenance(&self) -> usize {
      let Some(ttl) = self.ttl else {
         return 0;
      };

      let now = Instant::now();
      let mut storage = self.storage.lock();
      let expired: Vec<String> = storage
         .entries
         .iter()
         .filter(|(_, entry)| now.duration_since(entry.inserted_at) >= ttl)
         .map(|(key, _)| key.clone())
         .collect();

      for key in &expired {
         storage.entries.remove(key);
      }
      storage.access_order.retain(|k| !expired.contains(k));
      storage.expirations += expired.len() as u64;
      expired.len()
   }

   pub fn stats(&self) -> CacheStats {
      let storage = self.storage.lock();
      let repositories = storage
         .entries
         .values()
         .map(|entry| entry.repository.as_str())
         .collect::<std::collections::HashSet<_>>()
         .len();

      CacheStats {
         entries: storage.entries.len(),
         repositories,
         hits: storage.hits,
         misses: storage.misses,
         evictions: storage.evictions,
         expirations: storage.expirations,
      }
   }
}

/// Hex sha256 over repository + prompt, the cache's content address.
fn cache_key(repository: &str, prompt: &str) -> String {
   let mut hasher = Sha256::new();
   hasher.update(repository.as_bytes());
   hasher.update(prompt.as_bytes());
   format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
   use std::{sync::Arc, thread};

   use super::*;

   fn completion(content: &str) -> Completion {
      Completion { content: content.to_string(), tokens_used: 10 }
   }

   #[test]
   fn test_cache_key_is_hex_sha256() {
      let key = cache_key("o/r", "prompt");
      assert_eq!(key.len(), 64);
      assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

      // Content-addressed: same inputs, same key; different inputs, different key
      assert_eq!(key, cache_key("o/r", "prompt"));
      assert_ne!(key, cache_key("o/r", "other prompt"));
      assert_ne!(key, cache_key("o/r2", "prompt"));
   }

   #[test]
   fn test_put_then_get_roundtrip() {
      let cache = PromptCache::new(8, None);
      cache.put("o/r", "p1", completion("answer"));

      assert_eq!(cache.get("o/r", "p1"), Some(completion("answer")));
      assert_eq!(cache.get("o/r", "p2"), None);
      assert_eq!(cache.get("other/repo", "p1"), None);
   }

   #[test]
   fn test_clear_all_empties_cache() {
      let cache = PromptCache::new(8, None);
      cache.put("o/r", "p1", completion("a"));
      cache.put("o/r", "p2", completion("b"));

      cache.clear_all();
      assert_eq!(cache.get("o/r", "p1"), None);
      assert_eq!(cache.get("o/r", "p2"), None);
      assert_eq!(cache.stats().entries, 0);
   }

   #[test]
   fn test_clear_repository_is_scoped() {
      let cache = PromptCache::new(8, None);
      cache.put("o/r", "p1", completion("a"));
      cache.put("o/other", "p1", completion("b"));

      cache.clear_repository("o/r");
      assert_eq!(cache.get("o/r", "p1"), None);
      assert_eq!(cache.get("o/other", "p1"), Some(completion("b")));
   }

   #[test]
   fn test_capacity_evicts_exactly_one_lru_entry() {
      let cache = PromptCache::new(3, None);
      cache.put("o/r", "p1", completion("a"));
      cache.put("o/r", "p2", completion("b"));
      cache.put("o/r", "p3", completion("c"));

      // Touch p1 so p2 becomes the least recently accessed
      assert!(cache.get("o/r", "p1").is_some());

      cache.put("o/r", "p4", completion("d"));

      assert_eq!(cache.stats().evictions, 1);
      assert_eq!(cache.stats().entries, 3);
      assert_eq!(cache.get("o/r", "p2"), None, "LRU entry must be the one evicted");
      assert!(cache.get("o/r", "p1").is_some());
      assert!(cache.get("o/r", "p3").is_some());
      assert!(cache.get("o/r", "p4").is_some());
   }

   #[test]
   fn test_overwrite_does_not_evict() {
      let cache = PromptCache::new(2, None);
      cache.put("o/r", "p1", completion("a"));
      cache.put("o/r", "p2", completion("b"));
      cache.put("o/r", "p1", completion("a2"));

      assert_eq!(cache.stats().evictions, 0);
      assert_eq!(cache.get("o/r", "p1"), Some(completion("a2")));
      assert_eq!(cache.get("o/r", "p2"), Some(completion("b")));
   }

   #[test]
   fn test_maintenance_expires_old_entries() {
      let cache = PromptCache::new(8, Some(Duration::from_millis(20)));
      cache.put("o/r", "p1", completion("a"));

      assert_eq!(cache.maintenance(), 0, "Fresh entries survive maintenance");

      thread::sleep(Duration::from_millis(30));
      cache.put("o/r", "p2", completion("b"));

      assert_eq!(cache.maintenance(), 1);
      assert_eq!(cache.get("o/r", "p1"), None);
      assert_eq!(cache.get("o/r", "p2"), Some(completion("b")));
      assert_eq!(cache.stats().expirations, 1);
   }

   #[test]
   fn test_maintenance_without_ttl_is_noop() {
      let cache = PromptCache::new(8, None);
      cache.put("o/r", "p1", completion("a"));
      assert_eq!(cache.maintenance(), 0);
      assert!(cache.get("o/r", "p1").is_some());
   }

   #[test]
   fn test_stats_counters() {
      let cache = PromptCache::new(8, None);
      cache.put("o/r", "p1", completion("a"));
      cache.put("x/y", "p1", completion("b"));

      let _ = cache.get("o/r", "p1"); // hit
      let _ = cache.get("o/r", "p1"); // hit
      let _ = cache.get("o/r", "nope"); // miss

      let stats = cache.stats();
      assert_eq!(stats.entries, 2);
      assert_eq!(stats.repositories, 2);
      assert_eq!(stats.hits, 2);
      assert_eq!(stats.misses, 1);
   }

   #[test]
   fn test_concurrent_mutation_is_safe() {
      let cache = Arc::new(PromptCache::new(64, None));
      let mut handles = Vec::new();

      for t in 0..8 {
         let cache = Arc::clone(&cache);
         handles.push(thread::spawn(move || {
            for i in 0..20 {
               let prompt = format!("prompt-{t}-{i}");
               cache.put("o/r", &prompt, completion("v"));
               let _ = cache.get("o/r", &prompt);
            }
         }));
      }

      for handle in handles {
         handle.join().unwrap();
      }

      assert_eq!(cache.stats().entries, 64.min(8 * 20));
   }
}
