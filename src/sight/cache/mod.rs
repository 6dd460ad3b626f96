/// 三層視線緩存
///
/// - `ttl`：座標量化後的短效緩存
/// - `grid`：粗網格長效緩存
/// - `pair`：以單位配對為鍵、每個 epoch 清空的緩存
pub mod grid;
pub mod pair;
pub mod ttl;

pub use self::{
    grid::{GridCache, GridKey},
    pair::{PairCache, PairKey},
    ttl::{TtlCache, TtlKey},
};

use vek::Vec3;

/// 座標量化倍率（1/100 單位）
pub const QUANT_SCALE: f32 = 100.0;

/// 四捨五入到 1/100 格
pub fn quantize(p: Vec3<f32>) -> [i64; 3] {
    [
        (p.x * QUANT_SCALE).round() as i64,
        (p.y * QUANT_SCALE).round() as i64,
        (p.z * QUANT_SCALE).round() as i64,
    ]
}

/// 向下取整到網格座標
pub fn cell_of(p: Vec3<f32>, cell_size: f32) -> [i32; 3] {
    [
        (p.x / cell_size).floor() as i32,
        (p.y / cell_size).floor() as i32,
        (p.z / cell_size).floor() as i32,
    ]
}

/// 各層目前的項目數
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheSizes {
    pub ttl: usize,
    pub grid: usize,
    pub pair: usize,
}
