//! Name-keyed caches for shared models and textures
//!
//! Components share loaded geometry and textures through `Arc`, so a file
//! is uploaded once no matter how many objects use it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::render::error::EngineResult;
use crate::render::resources::model::Model;
use crate::render::resources::texture::Texture;

/// Cache of textures keyed by file name
pub type TextureCache = ResourceCache<Texture>;

/// Cache of models keyed by file name
pub type ModelCache = ResourceCache<Model>;

/// Hit and miss counters of a cache
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that ran the loader
    pub misses: u64,
}

/// Shared resources keyed by the name part of their source path
pub struct ResourceCache<T> {
    entries: HashMap<String, Arc<T>>,
    stats: CacheStats,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<T> ResourceCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached resource for `path`, loading it on a miss
    ///
    /// The loader receives the full path and runs at most once per name.
    pub fn load_or_insert_with<F>(&mut self, path: &str, loader: F) -> EngineResult<Arc<T>>
    where
        F: FnOnce(&str) -> EngineResult<T>,
    {
        let name = resource_name(path);
        if let Some(existing) = self.entries.get(name) {
            self.stats.hits += 1;
            return Ok(Arc::clone(existing));
        }

        self.stats.misses += 1;
        let resource = Arc::new(loader(path)?);
        self.entries.insert(name.to_string(), Arc::clone(&resource));
        log::debug!("[CACHE] Loaded '{name}' ({} cached)", self.entries.len());
        Ok(resource)
    }

    /// Cached resource for `path`, if present
    pub fn get(&self, path: &str) -> Option<Arc<T>> {
        self.entries.get(resource_name(path)).cloned()
    }

    /// Insert a resource under the name of `path`, replacing any entry
    pub fn insert(&mut self, path: &str, resource: T) -> Arc<T> {
        let resource = Arc::new(resource);
        self.entries
            .insert(resource_name(path).to_string(), Arc::clone(&resource));
        resource
    }

    /// Drop the cache's reference; users keep theirs
    pub fn remove(&mut self, path: &str) -> Option<Arc<T>> {
        self.entries.remove(resource_name(path))
    }

    /// Drop entries nobody else references any more
    pub fn purge_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, resource| Arc::strong_count(resource) > 1);
        before - self.entries.len()
    }

    /// Drop every cached reference
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit and miss counters
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Cache key of a path: the text between the last separator and the last dot
///
/// Both `/` and `\` count as separators.
pub fn resource_name(path: &str) -> &str {
    let start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let file = &path[start..];
    file.rfind('.').map_or(file, |dot| &file[..dot])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_extraction() {
        assert_eq!(resource_name("textures/brick.png"), "brick");
        assert_eq!(resource_name("C:\\assets\\models\\teapot.obj"), "teapot");
        assert_eq!(resource_name("mixed\\dir/stone.wall.png"), "stone.wall");
        assert_eq!(resource_name("noext"), "noext");
        assert_eq!(resource_name("dir.v2/file"), "file");
    }

    #[test]
    fn test_loader_runs_once_per_name() {
        let mut cache: ResourceCache<u32> = ResourceCache::new();
        let mut loads = 0;

        let first = cache
            .load_or_insert_with("a/brick.png", |_| {
                loads += 1;
                Ok(7)
            })
            .unwrap();
        let second = cache
            .load_or_insert_with("other/brick.jpg", |_| {
                loads += 1;
                Ok(8)
            })
            .unwrap();

        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache: ResourceCache<u32> = ResourceCache::new();
        let result = cache.load_or_insert_with("bad.png", |_| {
            Err(crate::render::error::EngineError::UnsupportedFormat("bad".to_string()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_purge_keeps_referenced_entries() {
        let mut cache: ResourceCache<u32> = ResourceCache::new();
        let held = cache.insert("held.png", 1);
        cache.insert("dropped.png", 2);

        assert_eq!(cache.purge_unused(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("held.png").as_deref(), Some(&1));
        drop(held);
    }
}
