use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Embedding cache shared across evaluation runs
pub struct EmbeddingCache {
    embeddings: DashMap<String, Vec<f32>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            embeddings: DashMap::new(),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache an embedding
    pub fn set_embedding(&self, text: &str, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        if self.embeddings.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self.embeddings.iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.embeddings.remove(&key);
            }
        }
        let key = self.hash_text(text);
        self.embeddings.insert(key, embedding);
    }

    pub fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        let key = self.hash_text(text);
        let found = self.embeddings.get(&key).map(|r| r.value().clone());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn hash_text(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_counters() {
        let cache = EmbeddingCache::new(10);
        assert!(cache.get_embedding("manages").is_none());

        cache.set_embedding("manages", vec![1.0, 2.0]);
        assert_eq!(cache.get_embedding("manages"), Some(vec![1.0, 2.0]));

        let stats = cache.stats();
        assert_eq!(stats.embeddings_cached, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_eviction_keeps_size_bounded() {
        let cache = EmbeddingCache::new(4);
        for i in 0..20 {
            cache.set_embedding(&format!("label-{i}"), vec![i as f32]);
        }
        assert!(cache.stats().embeddings_cached <= 4);
        // the latest insert always survives
        assert!(cache.get_embedding("label-19").is_some());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = EmbeddingCache::new(0);
        cache.set_embedding("manages", vec![1.0]);
        assert_eq!(cache.stats().embeddings_cached, 0);
    }
}
