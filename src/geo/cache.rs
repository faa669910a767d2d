//! Bounded memo around the haversine computation.

use std::collections::{HashMap, VecDeque};

use super::haversine_nm;

/// Exact-bits key for one `(lat1, lon1, lat2, lon2)` query.
type Key = [u64; 4];

/// Fixed-capacity memo; the oldest entry is evicted first.
#[derive(Debug)]
pub struct HaversineCache {
    capacity: usize,
    entries: HashMap<Key, f64>,
    order: VecDeque<Key>,
    hits: u64,
    misses: u64,
}

impl Default for HaversineCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl HaversineCache {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached [`haversine_nm`].
    pub fn distance(&mut self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let key = [lat1.to_bits(), lon1.to_bits(), lat2.to_bits(), lon2.to_bits()];
        if let Some(distance) = self.entries.get(&key) {
            self.hits += 1;
            return *distance;
        }

        self.misses += 1;
        let distance = haversine_nm(lat1, lon1, lat2, lon2);
        self.insert(key, distance);
        distance
    }

    /// Insert and evict oldest entries over `capacity`.
    fn insert(&mut self, key: Key, distance: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, distance).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.entries.remove(&old);
                }
                None => break,
            }
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_query_hits() {
        let mut cache = HaversineCache::new(4);
        let first = cache.distance(1.0, 2.0, 3.0, 4.0);
        let second = cache.distance(1.0, 2.0, 3.0, 4.0);
        assert_eq!(first, second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn test_evicts_oldest_over_capacity() {
        let mut cache = HaversineCache::new(2);
        cache.distance(0.0, 0.0, 1.0, 1.0);
        cache.distance(0.0, 0.0, 2.0, 2.0);
        cache.distance(0.0, 0.0, 3.0, 3.0);
        assert_eq!(cache.len(), 2);

        // The first query was evicted, the third is still cached.
        cache.distance(0.0, 0.0, 3.0, 3.0);
        assert_eq!(cache.hits(), 1);
        cache.distance(0.0, 0.0, 1.0, 1.0);
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn test_zero_capacity_never_caches() {
        let mut cache = HaversineCache::new(0);
        cache.distance(0.0, 0.0, 1.0, 1.0);
        cache.distance(0.0, 0.0, 1.0, 1.0);
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
