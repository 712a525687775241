//! 窗口注册表
//!
//! 平台窗口 ID 到窗口状态的显式映射，由 UI 线程独占。

use std::collections::HashMap;
use std::hash::Hash;

/// 窗口 ID → 状态
#[derive(Debug)]
pub struct WindowRegistry<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> WindowRegistry<K, V> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// 注册窗口，返回被替换的旧状态
    pub fn insert(&mut self, id: K, state: V) -> Option<V> {
        self.entries.insert(id, state)
    }

    pub fn get(&self, id: &K) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &K) -> Option<&mut V> {
        self.entries.get_mut(id)
    }

    /// 窗口销毁时移除
    pub fn remove(&mut self, id: &K) -> Option<V> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for WindowRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
