/// 視線提供者介面
///
/// 宿主的射線檢測能力分三個等級，註冊時決定使用哪一個等級，
/// 查詢時不再重新判斷
use std::fmt;
use vek::Vec3;

use super::options::{TraceFilter, TraceMask};

/// 最基本的線段檢測
pub trait SegmentProbe: Send + Sync {
    /// 線段 from→to 是否沒有阻擋
    fn segment_clear(&self, from: Vec3<f32>, to: Vec3<f32>) -> bool;
}

/// 支援碰撞遮罩的線段檢測
pub trait MaskedSegmentProbe: SegmentProbe {
    fn segment_clear_masked(&self, from: Vec3<f32>, to: Vec3<f32>, mask: TraceMask) -> bool;
}

/// 支援過濾條件與遮罩的線段檢測
pub trait FilteredSegmentProbe: MaskedSegmentProbe {
    fn segment_clear_filtered(
        &self,
        from: Vec3<f32>,
        to: Vec3<f32>,
        filter: &TraceFilter,
        mask: TraceMask,
    ) -> bool;
}

/// 註冊後綁定的提供者
pub enum ProviderBinding {
    Filtered(Box<dyn FilteredSegmentProbe>),
    Masked(Box<dyn MaskedSegmentProbe>),
    Base(Box<dyn SegmentProbe>),
    /// 沒有提供者：目標存活即視為可見
    AliveOnly,
}

/// 射線呼叫種類，用於統計
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayKind {
    Base,
    Filtered,
    /// 沒有呼叫任何提供者
    Skipped,
}

impl ProviderBinding {
    pub fn level(&self) -> &'static str {
        match self {
            ProviderBinding::Filtered(_) => "filtered",
            ProviderBinding::Masked(_) => "masked",
            ProviderBinding::Base(_) => "base",
            ProviderBinding::AliveOnly => "alive_only",
        }
    }

    /// 依據綁定等級選擇最豐富的呼叫方式
    ///
    /// 沒有過濾也沒有遮罩時一律使用基本簽名
    pub fn trace(
        &self,
        from: Vec3<f32>,
        to: Vec3<f32>,
        filter: &TraceFilter,
        mask: TraceMask,
    ) -> (bool, RayKind) {
        let plain = filter.flags.is_empty() && mask == TraceMask::All;
        match self {
            ProviderBinding::Filtered(p) if plain => (p.segment_clear(from, to), RayKind::Base),
            ProviderBinding::Filtered(p) => (p.segment_clear_filtered(from, to, filter, mask), RayKind::Filtered),
            ProviderBinding::Masked(p) if mask == TraceMask::All => (p.segment_clear(from, to), RayKind::Base),
            ProviderBinding::Masked(p) => (p.segment_clear_masked(from, to, mask), RayKind::Filtered),
            ProviderBinding::Base(p) => (p.segment_clear(from, to), RayKind::Base),
            ProviderBinding::AliveOnly => (true, RayKind::Skipped),
        }
    }
}

impl Default for ProviderBinding {
    fn default() -> Self {
        ProviderBinding::AliveOnly
    }
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderBinding({})", self.level())
    }
}
