use hashbrown::HashMap;
use vek::Vec3;

use super::quantize;
use crate::sight::visibility::Visibility;

/// (較小識別碼, 較大識別碼, 量化地面點, 查詢簽章)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub low: u64,
    pub high: u64,
    pub ground: Option<[i64; 3]>,
    pub signature: u32,
}

impl PairKey {
    /// 任一方為匿名（0）時不產生鍵
    pub fn new(a: u64, b: u64, signature: u32) -> Option<Self> {
        if a == 0 || b == 0 {
            return None;
        }
        Some(Self {
            low: a.min(b),
            high: a.max(b),
            ground: None,
            signature,
        })
    }

    pub fn with_ground(self, ground: Option<Vec3<f32>>) -> Self {
        Self {
            ground: ground.map(quantize),
            ..self
        }
    }
}

/// 單位配對緩存，只在目前 epoch 內有效
#[derive(Debug, Default)]
pub struct PairCache {
    entries: HashMap<PairKey, Visibility>,
    epoch: u64,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 切換 epoch，值改變時整個清空
    pub fn advance_epoch(&mut self, epoch: u64) -> bool {
        if epoch == self.epoch {
            return false;
        }
        self.epoch = epoch;
        self.entries.clear();
        true
    }

    pub fn get(&self, key: &PairKey) -> Option<Visibility> {
        self.entries.get(key).copied()
    }

    pub fn put(&mut self, key: PairKey, result: Visibility) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, result);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
