use hashbrown::HashMap;
use instant::Instant;
use std::time::Duration;
use vek::Vec3;

use super::quantize;
use crate::sight::visibility::Visibility;

/// (量化起點, 量化終點, 量化地面點, 查詢簽章)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TtlKey {
    pub from: [i64; 3],
    pub to: [i64; 3],
    pub ground: Option<[i64; 3]>,
    pub signature: u32,
}

impl TtlKey {
    pub fn new(from: Vec3<f32>, to: Vec3<f32>, ground: Option<Vec3<f32>>, signature: u32) -> Self {
        Self {
            from: quantize(from),
            to: quantize(to),
            ground: ground.map(quantize),
            signature,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TtlEntry {
    result: Visibility,
    expires_at: Instant,
}

/// 短效座標緩存
///
/// 超過上限時整個清空，不做 LRU
#[derive(Debug)]
pub struct TtlCache {
    entries: HashMap<TtlKey, TtlEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl TtlCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// 未過期才回傳
    pub fn get(&self, key: &TtlKey, now: Instant) -> Option<Visibility> {
        self.entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.result)
    }

    /// 寫入結果，回傳是否真的寫入
    ///
    /// 有效期內的既有項目不會被覆寫
    pub fn put(&mut self, key: TtlKey, result: Visibility, now: Instant) -> bool {
        if self.get(&key, now).is_some() {
            return false;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            log::debug!("ttl sight cache full ({} entries), clearing", self.entries.len());
            self.entries.clear();
        }
        self.entries.insert(
            key,
            TtlEntry {
                result,
                expires_at: now + self.ttl,
            },
        );
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

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
