use std::num::NonZeroUsize;
use std::time::SystemTime;

use lru::LruCache;

use crate::store::StoredFile;

#[derive(Clone)]
struct CacheEntry {
    file: StoredFile,
    modified_time: SystemTime,
}

/// 以对象键为索引的 LRU 读缓存
pub struct ObjectCache {
    cache: LruCache<String, CacheEntry>,
}

impl ObjectCache {
    // 根据容量构造，容量为 0 时按 1 处理
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    // 放入
    pub fn push(&mut self, key: &str, file: StoredFile, modified_time: SystemTime) {
        let entry = CacheEntry {
            file,
            modified_time,
        };
        self.cache.put(key.to_string(), entry);
    }

    // 检查对象大小是否适合缓存
    pub fn should_cache(size: u64, threshold: u64) -> bool {
        size <= threshold
    }

    // 查询有效缓存，修改时间不一致视为失效
    pub fn find(&mut self, key: &str, current_modified_time: SystemTime) -> Option<StoredFile> {
        match self.cache.get(key) {
            Some(entry) if entry.modified_time == current_modified_time => Some(entry.file.clone()),
            _ => None,
        }
    }

    // 对象被覆盖或删除时移除
    pub fn invalidate(&mut self, key: &str) {
        self.cache.pop(key);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
