//! 翻译缓存模块
//!
//! 以 (目标语言, 引擎, 原文) 为键的内存缓存。容量满时按最近访问时间
//! 淘汰最旧的 20% 条目。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::translation::config::constants;

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translation: String,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(translation: String) -> Self {
        let now = Instant::now();
        Self {
            translation,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// 更新访问信息
    pub fn access(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

/// 翻译缓存
pub struct TranslationCache {
    state: Mutex<CacheState>,
    max_size: usize,
}

/// 生成缓存键
pub fn cache_key(text: &str, target_lang: &str, engine: &str) -> String {
    format!("{}:{}:{}", target_lang, engine, text)
}

impl TranslationCache {
    /// 创建指定容量的缓存，容量至少为 1
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_size: max_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 查找译文，命中时刷新最近访问时间
    pub fn get(&self, text: &str, target_lang: &str, engine: &str) -> Option<String> {
        let key = cache_key(text, target_lang, engine);
        let mut state = self.lock();

        let found = state.entries.get_mut(&key).map(|entry| {
            entry.access();
            entry.translation.clone()
        });

        match found {
            Some(_) => state.stats.hits += 1,
            None => state.stats.misses += 1,
        }
        found
    }

    /// 写入译文；新键且容量已满时先执行淘汰
    pub fn set(&self, text: &str, translation: &str, target_lang: &str, engine: &str) {
        let key = cache_key(text, target_lang, engine);
        let mut state = self.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            Self::evict_oldest(&mut state);
        }

        state
            .entries
            .insert(key, CacheEntry::new(translation.to_string()));
        state.stats.entries = state.entries.len();
    }

    /// 按最近访问时间升序淘汰最旧的 20%（向下取整）
    pub fn cleanup(&self) {
        let mut state = self.lock();
        let count = (state.entries.len() as f64 * constants::EVICTION_FRACTION).floor() as usize;
        Self::evict(&mut state, count);
    }

    /// 写入路径上的淘汰，至少移除一条以腾出空间
    fn evict_oldest(state: &mut CacheState) {
        let count = (state.entries.len() as f64 * constants::EVICTION_FRACTION).floor() as usize;
        Self::evict(state, count.max(1));
    }

    fn evict(state: &mut CacheState, count: usize) {
        if count == 0 || state.entries.is_empty() {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_accessed, key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(count) {
            state.entries.remove(&key);
            state.stats.evictions += 1;
        }

        state.stats.entries = state.entries.len();
        tracing::debug!("缓存淘汰 {} 条，剩余 {}", count, state.entries.len());
    }

    pub fn contains(&self, text: &str, target_lang: &str, engine: &str) -> bool {
        self.lock()
            .entries
            .contains_key(&cache_key(text, target_lang, engine))
    }

    /// 获取缓存大小
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// 清空缓存
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.stats.entries = 0;
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CacheStats {
        let state = self.lock();
        let mut stats = state.stats.clone();
        stats.entries = state.entries.len();
        stats
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(constants::DEFAULT_CACHE_SIZE)
    }
}
