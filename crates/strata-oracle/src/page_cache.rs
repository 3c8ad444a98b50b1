use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashMap;

use crate::source::SourceSample;

/// Page coordinate: integer samples `[px*size, (px+1)*size)` on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub px: i32,
    pub pz: i32,
}

impl PageKey {
    #[inline]
    pub const fn new(px: i32, pz: i32) -> Self {
        Self { px, pz }
    }

    #[inline]
    pub fn containing(ix: i32, iz: i32, page_size: usize) -> Self {
        let n = page_size as i32;
        Self {
            px: ix.div_euclid(n),
            pz: iz.div_euclid(n),
        }
    }
}

#[derive(Debug)]
pub struct Page {
    key: PageKey,
    size: usize,
    samples: Arc<[SourceSample]>,
}

impl Page {
    pub fn new(key: PageKey, size: usize, samples: Vec<SourceSample>) -> Arc<Self> {
        debug_assert_eq!(samples.len(), size * size);
        Arc::new(Self {
            key,
            size,
            samples: samples.into(),
        })
    }

    #[inline]
    pub fn key(&self) -> PageKey {
        self.key
    }

    /// Sample at absolute integer coordinates; `None` outside this page.
    #[inline]
    pub fn get(&self, ix: i32, iz: i32) -> Option<SourceSample> {
        let n = self.size as i32;
        let dx = ix - self.key.px * n;
        let dz = iz - self.key.pz * n;
        if dx < 0 || dz < 0 || dx >= n || dz >= n {
            return None;
        }
        self.samples
            .get(dz as usize * self.size + dx as usize)
            .copied()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PageCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// LRU-bounded map of populated pages, shared with the worker threads.
pub struct PageCache {
    entries: RwLock<HashMap<PageKey, Arc<Page>>>,
    order: Mutex<VecDeque<PageKey>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Lookup that refreshes the page's LRU position.
    pub fn get(&self, key: &PageKey) -> Option<Arc<Page>> {
        match self.peek(key) {
            Some(page) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.touch_key(key);
                Some(page)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Lookup on the sampling hot path: no LRU bookkeeping, no stats.
    #[inline]
    pub fn peek(&self, key: &PageKey) -> Option<Arc<Page>> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    /// Mark a resident page as recently used. No stats.
    pub fn refresh(&self, key: &PageKey) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.touch_key(key);
        true
    }

    #[inline]
    pub fn contains(&self, key: &PageKey) -> bool {
        self.entries
            .read()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    pub fn insert(&self, page: Arc<Page>) {
        let key = page.key();
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, page);
        }
        self.remove_from_order(&key);
        if let Ok(mut order) = self.order.lock() {
            order.push_back(key);
        }
        self.enforce_capacity();
    }

    pub fn snapshot(&self) -> PageCacheStats {
        PageCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.read().map(|m| m.len()).unwrap_or(0),
        }
    }

    pub fn invalidate_all(&self) {
        let evicted = match self.entries.write() {
            Ok(mut entries) => {
                let len = entries.len() as u64;
                entries.clear();
                len
            }
            Err(_) => 0,
        };
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        if let Ok(mut order) = self.order.lock() {
            order.clear();
        }
    }

    fn touch_key(&self, key: &PageKey) {
        let Ok(mut order) = self.order.lock() else {
            return;
        };
        if let Some(pos) = order.iter().position(|k| k == key) {
            if let Some(entry) = order.remove(pos) {
                order.push_back(entry);
            }
        }
    }

    fn remove_from_order(&self, key: &PageKey) {
        let Ok(mut order) = self.order.lock() else {
            return;
        };
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    fn enforce_capacity(&self) {
        let mut victims: Vec<PageKey> = Vec::new();
        if let Ok(mut order) = self.order.lock() {
            while order.len() > self.capacity {
                if let Some(old) = order.pop_front() {
                    victims.push(old);
                }
            }
        }
        if victims.is_empty() {
            return;
        }
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        for key in victims {
            if entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                log::trace!(target: "pages", "evicted page ({}, {})", key.px, key.pz);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(px: i32, pz: i32) -> Arc<Page> {
        let size = 2;
        let samples = (0..size * size)
            .map(|i| SourceSample {
                elevation: i as f32,
                ..SourceSample::default()
            })
            .collect();
        Page::new(PageKey::new(px, pz), size, samples)
    }

    #[test]
    fn page_get_uses_absolute_coordinates() {
        let p = page(-1, 2);
        assert_eq!(p.get(-2, 4).map(|s| s.elevation), Some(0.0));
        assert_eq!(p.get(-1, 5).map(|s| s.elevation), Some(3.0));
        assert!(p.get(0, 4).is_none());
        assert!(p.get(-2, 3).is_none());
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = PageCache::new(2);
        cache.insert(page(0, 0));
        cache.insert(page(1, 0));
        assert!(cache.get(&PageKey::new(0, 0)).is_some());
        cache.insert(page(2, 0));
        assert!(cache.contains(&PageKey::new(0, 0)));
        assert!(!cache.contains(&PageKey::new(1, 0)));
        assert!(cache.contains(&PageKey::new(2, 0)));
        let stats = cache.snapshot();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn containing_handles_negative_samples() {
        assert_eq!(PageKey::containing(-1, 0, 32), PageKey::new(-1, 0));
        assert_eq!(PageKey::containing(32, -33, 32), PageKey::new(1, -2));
    }
}
