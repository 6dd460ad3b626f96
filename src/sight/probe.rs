/// 探測幾何
///
/// 純函數，從目標位置產生候選點與線段。回傳的迭代器是惰性且有限的，
/// 取用後即消耗，不能重新開始
use std::f32::consts::FRAC_PI_4;
use vek::Vec3;

use super::snapshot::TargetSnapshot;

/// 垂直線段頂端高於頭部的距離
pub const VERTICAL_TOP_OFFSET: f32 = 8.0;
/// 垂直線段底端低於頭部的距離
pub const VERTICAL_BOTTOM_OFFSET: f32 = 40.0;
/// 軟性點雲側向點的高度比例
pub const SOFT_HEIGHT_SCALE: f32 = 0.85;
/// 膠囊環的點數
pub const CAPSULE_RING_POINTS: usize = 8;

/// 身體各部位的高度：頭、胸、骨盆、腿
pub fn body_heights(head: f32) -> [f32; 4] {
    let chest = (head - 14.0).max(12.0);
    let pelvis = (chest - 12.0).max(6.0);
    let legs = (pelvis - 12.0).max(2.0);
    [head, chest, pelvis, legs]
}

/// 胸口高度的膠囊環
pub fn capsule_ring(target: &TargetSnapshot, head: f32, radius: f32) -> impl Iterator<Item = Vec3<f32>> {
    let center = target.point_at_height(body_heights(head)[1]);
    (0..CAPSULE_RING_POINTS).map(move |k| {
        let angle = k as f32 * FRAC_PI_4;
        center + Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
    })
}

/// 依序產生頭、胸、骨盆、腿，必要時接上膠囊環
pub fn body_probes(
    target: &TargetSnapshot,
    head: f32,
    capsule_radius: Option<f32>,
) -> impl Iterator<Item = Vec3<f32>> {
    let target = *target;
    let heights = body_heights(head);
    let ring = capsule_radius
        .into_iter()
        .flat_map(move |radius| capsule_ring(&target, head, radius));
    heights
        .into_iter()
        .map(move |h| target.point_at_height(h))
        .chain(ring)
}

/// 頭部點加上前後左右四個偏移點
pub fn soft_cloud(target: &TargetSnapshot, head: f32, fudge: f32) -> impl Iterator<Item = Vec3<f32>> {
    let (forward, right) = target.horizontal_basis();
    let head_point = target.point_at_height(head);
    let low = target.point_at_height(head * SOFT_HEIGHT_SCALE);
    let offsets = [right * fudge, -right * fudge, forward * fudge, -forward * fudge];
    std::iter::once(head_point).chain(offsets.into_iter().map(move |o| low + o))
}

/// from 到 to 之間的等距取樣，t = i/steps，i = 1..=steps
///
/// 最後一個點就是 to
pub fn path_samples(from: Vec3<f32>, to: Vec3<f32>, steps: u32) -> impl Iterator<Item = Vec3<f32>> {
    let steps = steps.max(1);
    (1..=steps).map(move |i| {
        let t = i as f32 / steps as f32;
        from + (to - from) * t
    })
}

/// 目標頂端到底端，以及觀察者到目標頂端的兩條線段
pub fn vertical_segments(
    eye: Vec3<f32>,
    target: &TargetSnapshot,
    head: f32,
) -> impl Iterator<Item = (Vec3<f32>, Vec3<f32>)> {
    let top = target.point_at_height(head + VERTICAL_TOP_OFFSET);
    let bottom = target.point_at_height((head - VERTICAL_BOTTOM_OFFSET).max(0.0));
    [(top, bottom), (eye, top)].into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetSnapshot {
        TargetSnapshot::new(2, Vec3::new(500.0, 0.0, 0.0), 1)
    }

    #[test]
    fn body_heights_follow_clamps() {
        assert_eq!(body_heights(64.0), [64.0, 50.0, 38.0, 26.0]);
        // 很矮的單位，高度被下限夾住
        assert_eq!(body_heights(10.0), [10.0, 12.0, 6.0, 2.0]);
    }

    #[test]
    fn body_probes_with_ring() {
        let t = target();
        let points: Vec<_> = body_probes(&t, 64.0, Some(16.0)).collect();
        assert_eq!(points.len(), 4 + CAPSULE_RING_POINTS);
        assert_eq!(points[0], Vec3::new(500.0, 0.0, 64.0));
        assert_eq!(points[2].z, 38.0);
        for p in &points[4..] {
            assert_eq!(p.z, 50.0);
            let d = Vec3::new(p.x - 500.0, p.y, 0.0).magnitude();
            assert!((d - 16.0).abs() < 1e-3);
        }
        assert_eq!(body_probes(&t, 64.0, None).count(), 4);
    }

    #[test]
    fn soft_cloud_has_five_points() {
        let points: Vec<_> = soft_cloud(&target(), 64.0, 10.0).collect();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].z, 64.0);
        for p in &points[1..] {
            assert!((p.z - 64.0 * SOFT_HEIGHT_SCALE).abs() < 1e-4);
            let d = Vec3::new(p.x - 500.0, p.y, 0.0).magnitude();
            assert!((d - 10.0).abs() < 1e-3);
        }
    }

    #[test]
    fn path_samples_end_at_target() {
        let from = Vec3::zero();
        let to = Vec3::new(400.0, 0.0, 0.0);
        let points: Vec<_> = path_samples(from, to, 4).collect();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].x, 100.0);
        assert_eq!(points[3], to);
        // 0 步被夾成 1 步
        assert_eq!(path_samples(from, to, 0).count(), 1);
    }

    #[test]
    fn vertical_segments_shape() {
        let eye = Vec3::new(0.0, 0.0, 64.0);
        let segs: Vec<_> = vertical_segments(eye, &target(), 64.0).collect();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].0.z, 72.0);
        assert_eq!(segs[0].1.z, 24.0);
        assert_eq!(segs[1].0, eye);
        assert_eq!(segs[1].1, segs[0].0);
    }
}
