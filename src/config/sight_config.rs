use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sight::options::{FilterFlags, TraceMask};

/// 設定檔讀取錯誤
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("無法讀取設定檔 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML 格式錯誤: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("YAML 格式錯誤: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("不支援的檔案格式: {0}")]
    UnsupportedFormat(String),
}

/// 視線引擎設定
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SightSettings {
    /// 眼睛與頭部探測點的高度
    pub head_height: f32,
    /// 軟性點雲的側向偏移
    pub soft_fudge: f32,
    pub capsule_radius: f32,
    pub path_steps: u32,
    pub ttl_enabled: bool,
    /// TTL 緩存有效期（毫秒）
    pub ttl_ms: u64,
    pub ttl_max_entries: usize,
    pub grid_enabled: bool,
    pub grid_cell_size: f32,
    pub default_mask: TraceMask,
    pub default_filter: FilterFlags,
}

impl Default for SightSettings {
    fn default() -> Self {
        Self {
            head_height: 64.0,
            soft_fudge: 12.0,
            capsule_radius: 16.0,
            path_steps: 4,
            ttl_enabled: true,
            ttl_ms: 200,
            ttl_max_entries: 4096,
            grid_enabled: true,
            grid_cell_size: 64.0,
            default_mask: TraceMask::All,
            default_filter: FilterFlags::NONE,
        }
    }
}

/// 部分覆寫，沒給的欄位保持原值
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SettingsOverrides {
    pub head_height: Option<f32>,
    pub soft_fudge: Option<f32>,
    pub capsule_radius: Option<f32>,
    pub path_steps: Option<u32>,
    pub ttl_enabled: Option<bool>,
    pub ttl_ms: Option<u64>,
    pub ttl_max_entries: Option<usize>,
    pub grid_enabled: Option<bool>,
    pub grid_cell_size: Option<f32>,
    pub default_mask: Option<TraceMask>,
    pub default_filter: Option<FilterFlags>,
}

#[derive(Deserialize)]
struct SettingFile {
    #[serde(default)]
    sight: SightSettings,
}

impl SightSettings {
    /// 從 .toml / .yaml / .yml 載入 `sight` 區段
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match ext {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            other => Err(SettingsError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let file: SettingFile = toml::from_str(content)?;
        Ok(file.sight.clamped())
    }

    pub fn from_yaml(content: &str) -> Result<Self, SettingsError> {
        let file: SettingFile = serde_yaml::from_str(content)?;
        Ok(file.sight.clamped())
    }

    /// 套用覆寫並夾到安全範圍
    pub fn merged(&self, overrides: &SettingsOverrides) -> Self {
        let o = overrides;
        Self {
            head_height: o.head_height.unwrap_or(self.head_height),
            soft_fudge: o.soft_fudge.unwrap_or(self.soft_fudge),
            capsule_radius: o.capsule_radius.unwrap_or(self.capsule_radius),
            path_steps: o.path_steps.unwrap_or(self.path_steps),
            ttl_enabled: o.ttl_enabled.unwrap_or(self.ttl_enabled),
            ttl_ms: o.ttl_ms.unwrap_or(self.ttl_ms),
            ttl_max_entries: o.ttl_max_entries.unwrap_or(self.ttl_max_entries),
            grid_enabled: o.grid_enabled.unwrap_or(self.grid_enabled),
            grid_cell_size: o.grid_cell_size.unwrap_or(self.grid_cell_size),
            default_mask: o.default_mask.unwrap_or(self.default_mask),
            default_filter: o.default_filter.unwrap_or(self.default_filter),
        }
        .clamped()
    }

    /// 不合法的值不報錯，直接夾到最小安全值
    pub fn clamped(mut self) -> Self {
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let defaults = Self::default();
        self.head_height = finite_or(self.head_height, defaults.head_height).max(2.0);
        self.soft_fudge = finite_or(self.soft_fudge, defaults.soft_fudge).max(0.0);
        self.capsule_radius = finite_or(self.capsule_radius, defaults.capsule_radius).max(0.0);
        self.path_steps = self.path_steps.max(1);
        self.ttl_ms = self.ttl_ms.max(1);
        self.ttl_max_entries = self.ttl_max_entries.max(1);
        self.grid_cell_size = finite_or(self.grid_cell_size, defaults.grid_cell_size).max(1.0);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}
