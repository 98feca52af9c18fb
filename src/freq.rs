//! 单文件词频/相邻词对频率统计。
//!
//! 每个 worker 独占一个 [`FrequencyCounter`]，不跨文件合并。

use hashbrown::HashMap;

#[derive(Debug, Default, Clone)]
pub struct FrequencyCounter {
    unigrams: HashMap<u32, u64>,
    bigrams: HashMap<(u32, u32), u64>,
    prev: Option<u32>,
    total: u64,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unigram(&mut self, id: u32) {
        *self.unigrams.entry(id).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn record_bigram(&mut self, prev_id: u32, id: u32) {
        *self.bigrams.entry((prev_id, id)).or_insert(0) += 1;
    }

    /// 新的一段（子行）开始：词对不跨段统计
    pub fn start_new_run(&mut self) {
        self.prev = None;
    }

    /// 记录一个合格 token：unigram，若同段内有前一个 token 则记 bigram，再移动游标。
    pub fn observe(&mut self, id: u32) {
        self.record_unigram(id);
        if let Some(prev) = self.prev {
            self.record_bigram(prev, id);
        }
        self.prev = Some(id);
    }

    pub fn unigrams(&self) -> &HashMap<u32, u64> {
        &self.unigrams
    }

    pub fn bigrams(&self) -> &HashMap<(u32, u32), u64> {
        &self.bigrams
    }

    pub fn total_tokens(&self) -> u64 {
        self.total
    }

    pub fn sorted_unigrams(&self) -> Vec<(u32, u64)> {
        let mut v: Vec<(u32, u64)> = self.unigrams.iter().map(|(&k, &c)| (k, c)).collect();
        v.sort_unstable_by_key(|&(k, _)| k);
        v
    }

    pub fn sorted_bigrams(&self) -> Vec<((u32, u32), u64)> {
        let mut v: Vec<((u32, u32), u64)> = self.bigrams.iter().map(|(&k, &c)| (k, c)).collect();
        v.sort_unstable_by_key(|&(k, _)| k);
        v
    }
}
