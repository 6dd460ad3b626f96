/// 以軸對齊方塊組成的簡易世界
///
/// 牆壁屬於世界幾何，單位身體屬於可被遮罩或過濾的實體。
/// 用於範例程式與測試，實際遊戲由宿主提供射線檢測
use serde::{Deserialize, Serialize};
use vek::{Aabb, Vec3};

use super::options::{TraceFilter, TraceMask};
use super::provider::{FilteredSegmentProbe, MaskedSegmentProbe, SegmentProbe};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyBox {
    pub identity: u64,
    pub team: i32,
    pub is_player: bool,
    pub bounds: Aabb<f32>,
}

impl BodyBox {
    /// 以腳底位置、半徑與身高建立身體方塊
    pub fn standing(identity: u64, team: i32, is_player: bool, feet: Vec3<f32>, radius: f32, height: f32) -> Self {
        Self {
            identity,
            team,
            is_player,
            bounds: Aabb {
                min: feet - Vec3::new(radius, radius, 0.0),
                max: feet + Vec3::new(radius, radius, height),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoxWorld {
    pub walls: Vec<Aabb<f32>>,
    pub bodies: Vec<BodyBox>,
}

/// 線段與方塊的 slab 相交測試
fn segment_hits(bounds: &Aabb<f32>, from: Vec3<f32>, to: Vec3<f32>) -> bool {
    let origin = from.into_array();
    let dir = (to - from).into_array();
    let lo = bounds.min.into_array();
    let hi = bounds.max.into_array();
    let mut t_enter = 0.0f32;
    let mut t_exit = 1.0f32;
    for axis in 0..3 {
        if dir[axis].abs() < 1e-8 {
            if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                return false;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut a = (lo[axis] - origin[axis]) * inv;
        let mut b = (hi[axis] - origin[axis]) * inv;
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        t_enter = t_enter.max(a);
        t_exit = t_exit.min(b);
        if t_enter > t_exit {
            return false;
        }
    }
    true
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wall(mut self, min: Vec3<f32>, max: Vec3<f32>) -> Self {
        self.walls.push(Aabb { min, max });
        self
    }

    pub fn with_body(mut self, body: BodyBox) -> Self {
        self.bodies.push(body);
        self
    }

    fn walls_clear(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool {
        !self.walls.iter().any(|w| segment_hits(w, from, to))
    }

    /// 包含終點的身體就是被看的目標本身，不算阻擋
    fn bodies_clear<F>(&self, from: Vec3<f32>, to: Vec3<f32>, skip: F) -> bool
    where
        F: Fn(&BodyBox) -> bool,
    {
        !self
            .bodies
            .iter()
            .filter(|b| !b.bounds.contains_point(to))
            .filter(|b| !skip(b))
            .any(|b| segment_hits(&b.bounds, from, to))
    }
}

impl SegmentProbe for BoxWorld {
    fn segment_clear(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool {
        self.walls_clear(from, to) && self.bodies_clear(from, to, |_| false)
    }
}

impl MaskedSegmentProbe for BoxWorld {
    fn segment_clear_masked(&self, from: Vec3<f32>, to: Vec3<f32>, mask: TraceMask) -> bool {
        if !self.walls_clear(from, to) {
            return false;
        }
        match mask {
            TraceMask::All => self.bodies_clear(from, to, |_| false),
            TraceMask::PlayerSolid => self.bodies_clear(from, to, |b| !b.is_player),
            TraceMask::WorldOnly => true,
        }
    }
}

impl FilteredSegmentProbe for BoxWorld {
    fn segment_clear_filtered(
        &self,
        from: Vec3<f32>,
        to: Vec3<f32>,
        filter: &TraceFilter,
        mask: TraceMask,
    ) -> bool {
        if !self.walls_clear(from, to) {
            return false;
        }
        let masked_out = |b: &BodyBox| match mask {
            TraceMask::All => false,
            TraceMask::PlayerSolid => !b.is_player,
            TraceMask::WorldOnly => true,
        };
        self.bodies_clear(from, to, |b| masked_out(b) || filter.ignores(b.identity, b.team, b.is_player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sight::options::FilterFlags;

    fn wall_world() -> BoxWorld {
        BoxWorld::new().with_wall(Vec3::new(200.0, -50.0, 0.0), Vec3::new(220.0, 50.0, 45.0))
    }

    #[test]
    fn low_wall_blocks_low_segments_only() {
        let world = wall_world();
        assert!(!world.segment_clear(Vec3::new(0.0, 0.0, 30.0), Vec3::new(500.0, 0.0, 30.0)));
        assert!(world.segment_clear(Vec3::new(0.0, 0.0, 64.0), Vec3::new(500.0, 0.0, 64.0)));
        // 平行於牆但在牆外
        assert!(world.segment_clear(Vec3::new(0.0, 100.0, 10.0), Vec3::new(500.0, 100.0, 10.0)));
    }

    #[test]
    fn masks_and_filters_pass_through_bodies() {
        let creep = BodyBox::standing(9, 2, false, Vec3::new(100.0, 0.0, 0.0), 16.0, 72.0);
        let world = BoxWorld::new().with_body(creep);
        let from = Vec3::new(0.0, 0.0, 64.0);
        let to = Vec3::new(300.0, 0.0, 64.0);
        assert!(!world.segment_clear(from, to));
        assert!(world.segment_clear_masked(from, to, TraceMask::WorldOnly));
        assert!(world.segment_clear_masked(from, to, TraceMask::PlayerSolid));
        let filter = TraceFilter { flags: FilterFlags::IGNORE_ENEMY, owner: 1, owner_team: 1 };
        assert!(world.segment_clear_filtered(from, to, &filter, TraceMask::All));
        let filter = TraceFilter { flags: FilterFlags::IGNORE_FRIEND, owner: 1, owner_team: 1 };
        assert!(!world.segment_clear_filtered(from, to, &filter, TraceMask::All));
    }

    #[test]
    fn target_body_does_not_block_itself() {
        let target = BodyBox::standing(5, 2, true, Vec3::new(300.0, 0.0, 0.0), 16.0, 72.0);
        let world = BoxWorld::new().with_body(target);
        assert!(world.segment_clear(Vec3::new(0.0, 0.0, 64.0), Vec3::new(300.0, 0.0, 64.0)));
    }

    #[test]
    fn owner_body_needs_ignore_owner() {
        let me = BodyBox::standing(1, 1, true, Vec3::zero(), 16.0, 72.0);
        let world = BoxWorld::new().with_body(me);
        let from = Vec3::new(0.0, 0.0, 64.0);
        let to = Vec3::new(300.0, 0.0, 64.0);
        assert!(!world.segment_clear(from, to));
        let filter = TraceFilter { flags: FilterFlags::IGNORE_OWNER, owner: 1, owner_team: 1 };
        assert!(world.segment_clear_filtered(from, to, &filter, TraceMask::All));
    }
}
