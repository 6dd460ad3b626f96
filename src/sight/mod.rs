/// 視線查詢模組
///
/// 判斷觀察者與目標之間是否有無阻擋的視線，供技能目標、範圍效果、
/// 投射物與光束命中判定使用
pub mod box_world;
pub mod cache;
pub mod engine;
pub mod metrics;
pub mod options;
pub mod probe;
pub mod provider;
pub mod snapshot;
pub mod visibility;

pub use self::{
    box_world::{BodyBox, BoxWorld},
    cache::CacheSizes,
    engine::SightEngine,
    metrics::{MetricsSnapshot, SightMetrics},
    options::{FilterFlags, QueryFlags, QueryOptions, QueryPreset, TraceFilter, TraceMask},
    provider::{FilteredSegmentProbe, MaskedSegmentProbe, ProviderBinding, RayKind, SegmentProbe},
    snapshot::TargetSnapshot,
    visibility::{SightReason, Visibility},
};
