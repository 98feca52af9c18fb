//! 全局词表：token <-> id 双向映射，id 从 0 开始连续分配。
//!
//! 所有 worker 共享同一个 [`Vocabulary`]。查找和插入在同一把锁内完成，
//! 因此同一个 token 即使被多个 worker 同时首次遇到，也只会分到一个 id。

use anyhow::{bail, Result};
use hashbrown::HashMap;
use std::sync::{Mutex, MutexGuard};

/// id 为 u32，最多 u32::MAX + 1 个词
const MAX_ENTRIES: u64 = u32::MAX as u64 + 1;

struct VocabInner {
    forward: HashMap<String, u32>,
    /// reverse[id] = token；长度即下一个待分配的 id
    reverse: Vec<String>,
    max_entries: u64,
}

impl VocabInner {
    fn resolve(&mut self, token: &str) -> Result<u32> {
        if let Some(&id) = self.forward.get(token) {
            return Ok(id);
        }
        let next = self.reverse.len();
        let id = match u32::try_from(next) {
            Ok(id) if (id as u64) < self.max_entries => id,
            _ => bail!("vocabulary is full ({next} entries), cannot add {token:?}"),
        };
        self.reverse.push(token.to_owned());
        self.forward.insert(token.to_owned(), id);
        Ok(id)
    }
}

pub struct Vocabulary {
    inner: Mutex<VocabInner>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::with_max_entries(MAX_ENTRIES)
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 限制词表容量；超出后 `resolve` 返回错误而不是复用 id
    pub fn with_max_entries(max_entries: u64) -> Self {
        Self {
            inner: Mutex::new(VocabInner {
                forward: HashMap::new(),
                reverse: Vec::new(),
                max_entries: max_entries.min(MAX_ENTRIES),
            }),
        }
    }

    // 持锁期间 forward/reverse 总是一起更新，中毒后数据仍一致，直接取回
    fn lock(&self) -> MutexGuard<'_, VocabInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 返回 token 的 id；首次出现时分配下一个 id。词表已满时返回错误。
    pub fn resolve(&self, token: &str) -> Result<u32> {
        self.lock().resolve(token)
    }

    /// 按顺序解析一整段 token，只加一次锁。
    pub fn resolve_run<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<u32>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.lock();
        tokens.iter().map(|t| inner.resolve(t.as_ref())).collect()
    }

    /// 只读查找，不分配 id。
    pub fn get(&self, token: &str) -> Option<u32> {
        self.lock().forward.get(token).copied()
    }

    pub fn token(&self, id: u32) -> Option<String> {
        self.lock().reverse.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 导出 `(token, id)`，按 id 升序。
    pub fn export(&self) -> Vec<(String, u32)> {
        let inner = self.lock();
        inner
            .reverse
            .iter()
            .enumerate()
            .map(|(id, tok)| (tok.clone(), id as u32))
            .collect()
    }
}
