use hashbrown::HashMap;
use vek::Vec3;

use super::cell_of;
use crate::sight::visibility::Visibility;

/// (起點格, 終點格, 地面點格, 查詢簽章)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub from: [i32; 3],
    pub to: [i32; 3],
    pub ground: Option<[i32; 3]>,
    pub signature: u32,
}

impl GridKey {
    pub fn swapped(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            ..self
        }
    }
}

/// 長效網格緩存
///
/// 只在重設或設定變更時清空
#[derive(Debug)]
pub struct GridCache {
    entries: HashMap<GridKey, Visibility>,
    cell_size: f32,
}

impl GridCache {
    pub fn new(cell_size: f32) -> Self {
        Self {
            entries: HashMap::new(),
            cell_size: cell_size.max(1.0),
        }
    }

    pub fn key(&self, from: Vec3<f32>, to: Vec3<f32>, ground: Option<Vec3<f32>>, signature: u32) -> GridKey {
        GridKey {
            from: cell_of(from, self.cell_size),
            to: cell_of(to, self.cell_size),
            ground: ground.map(|p| cell_of(p, self.cell_size)),
            signature,
        }
    }

    /// 先查 (A,B)，允許時再查 (B,A)
    pub fn get(&self, key: &GridKey, symmetric: bool) -> Option<Visibility> {
        if let Some(result) = self.entries.get(key) {
            return Some(*result);
        }
        if symmetric {
            return self.entries.get(&key.swapped()).copied();
        }
        None
    }

    /// 已存在的項目不會被覆寫
    pub fn put(&mut self, key: GridKey, result: Visibility) -> bool {
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

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sight::visibility::SightReason;

    #[test]
    fn symmetric_lookup_finds_reverse_pair() {
        let mut cache = GridCache::new(64.0);
        let a = Vec3::new(10.0, 10.0, 0.0);
        let b = Vec3::new(500.0, 0.0, 0.0);
        cache.put(cache.key(a, b, None, 3), Visibility::VISIBLE);
        let reverse = cache.key(b, a, None, 3);
        assert_eq!(cache.get(&reverse, true), Some(Visibility::VISIBLE));
        assert_eq!(cache.get(&reverse, false), None);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        let cache = GridCache::new(64.0);
        let k1 = cache.key(Vec3::new(1.0, 1.0, 0.0), Vec3::new(200.0, 0.0, 0.0), None, 0);
        let k2 = cache.key(Vec3::new(60.0, 30.0, 10.0), Vec3::new(250.0, 5.0, 0.0), None, 0);
        assert_eq!(k1, k2);
    }

    #[test]
    fn ground_cell_separates_entries() {
        let mut cache = GridCache::new(64.0);
        let (a, b) = (Vec3::zero(), Vec3::new(500.0, 0.0, 0.0));
        let far = cache.key(a, b, Some(Vec3::new(900.0, 0.0, 0.0)), 1);
        let near = cache.key(a, b, Some(Vec3::new(10.0, 0.0, 0.0)), 1);
        cache.put(far, Visibility::blocked(SightReason::Ground));
        assert_eq!(cache.get(&near, false), None);
        assert_eq!(cache.get(&far, false).map(|v| v.reason), Some(SightReason::Ground));
    }

    #[test]
    fn zero_cell_size_is_clamped() {
        assert_eq!(GridCache::new(0.0).cell_size(), 1.0);
    }
}
