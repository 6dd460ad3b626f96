/// Open MOBA 視線查詢引擎
///
/// 技能目標、範圍效果、投射物與光束命中判定共用的視線查詢服務
pub mod config;
pub mod sight;
pub mod tick;

// Re-export commonly used types
pub use crate::config::*;
pub use crate::sight::*;
