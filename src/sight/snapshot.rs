use serde::{Deserialize, Serialize};
use vek::Vec3;

/// 查詢當下某個單位的狀態快照
///
/// 由呼叫端（技能、投射物、範圍效果）在每次查詢前打包，
/// 引擎本身不會直接讀取單位狀態
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// 腳底位置（+Z 向上）
    pub position: Vec3<f32>,
    /// 面向（單位向量）
    pub forward: Vec3<f32>,
    pub team: i32,
    pub alive: bool,
    pub is_self: bool,
    /// 穩定識別碼，0 代表匿名（不進入配對緩存）
    pub identity: u64,
}

impl TargetSnapshot {
    /// 匿名識別碼
    pub const ANONYMOUS: u64 = 0;

    pub fn new(identity: u64, position: Vec3<f32>, team: i32) -> Self {
        Self {
            position,
            forward: Vec3::unit_x(),
            team,
            alive: true,
            is_self: false,
            identity,
        }
    }

    /// 合成的探測點（地面點、路徑取樣點）
    pub fn synthetic(position: Vec3<f32>) -> Self {
        Self::new(Self::ANONYMOUS, position, 0)
    }

    pub fn with_forward(mut self, forward: Vec3<f32>) -> Self {
        self.forward = forward;
        self
    }

    pub fn with_alive(mut self, alive: bool) -> Self {
        self.alive = alive;
        self
    }

    pub fn with_self(mut self, is_self: bool) -> Self {
        self.is_self = is_self;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity == Self::ANONYMOUS
    }

    /// 指定高度的身體點
    pub fn point_at_height(&self, height: f32) -> Vec3<f32> {
        self.position + Vec3::unit_z() * height
    }

    /// 水平面上的面向與右方向量，面向退化時使用 +X
    pub fn horizontal_basis(&self) -> (Vec3<f32>, Vec3<f32>) {
        let flat = Vec3::new(self.forward.x, self.forward.y, 0.0);
        let forward = if flat.magnitude_squared() > 1e-6 {
            flat.normalized()
        } else {
            Vec3::unit_x()
        };
        let right = forward.cross(Vec3::unit_z());
        (forward, right)
    }
}
