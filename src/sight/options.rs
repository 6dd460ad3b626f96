use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use vek::Vec3;

/// 查詢策略旗標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueryFlags(pub u16);

impl QueryFlags {
    pub const NONE: QueryFlags = QueryFlags(0);
    /// 先檢查觀察者到地面點
    pub const GROUND_CHECK: QueryFlags = QueryFlags(1 << 0);
    /// 觀察者到目標之間的連續走廊
    pub const PATH_CHECK: QueryFlags = QueryFlags(1 << 1);
    /// 頭、胸、骨盆、腿多點探測
    pub const MULTI_PROBE: QueryFlags = QueryFlags(1 << 2);
    /// 胸口高度的膠囊環
    pub const CAPSULE_FALLBACK: QueryFlags = QueryFlags(1 << 3);
    /// 頭部周圍的抖動點
    pub const SOFT_CLOUD: QueryFlags = QueryFlags(1 << 4);
    pub const USE_TTL_CACHE: QueryFlags = QueryFlags(1 << 5);
    /// 垂直與斜向的額外線段
    pub const VERTICAL_EXTRA: QueryFlags = QueryFlags(1 << 6);
    pub const WORLD_ONLY: QueryFlags = QueryFlags(1 << 7);
    pub const IGNORE_PLAYERS: QueryFlags = QueryFlags(1 << 8);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: QueryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: QueryFlags) -> QueryFlags {
        QueryFlags(self.0 | other.0)
    }

    pub const fn without(self, other: QueryFlags) -> QueryFlags {
        QueryFlags(self.0 & !other.0)
    }

    pub fn insert(&mut self, other: QueryFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: QueryFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for QueryFlags {
    type Output = QueryFlags;

    fn bitor(self, rhs: QueryFlags) -> QueryFlags {
        self.union(rhs)
    }
}

impl BitOrAssign for QueryFlags {
    fn bitor_assign(&mut self, rhs: QueryFlags) {
        self.insert(rhs);
    }
}

/// 射線過濾旗標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterFlags(pub u8);

impl FilterFlags {
    pub const NONE: FilterFlags = FilterFlags(0);
    /// 忽略觀察者自己的身體
    pub const IGNORE_OWNER: FilterFlags = FilterFlags(1 << 0);
    pub const IGNORE_PLAYERS: FilterFlags = FilterFlags(1 << 1);
    /// 忽略與觀察者同隊的單位
    pub const IGNORE_FRIEND: FilterFlags = FilterFlags(1 << 2);
    /// 忽略與觀察者不同隊的單位
    pub const IGNORE_ENEMY: FilterFlags = FilterFlags(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: FilterFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: FilterFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: FilterFlags) -> FilterFlags {
        FilterFlags(self.0 | other.0)
    }
}

impl BitOr for FilterFlags {
    type Output = FilterFlags;

    fn bitor(self, rhs: FilterFlags) -> FilterFlags {
        self.union(rhs)
    }
}

/// 射線碰撞遮罩
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMask {
    /// 世界幾何與所有單位
    #[default]
    All,
    /// 世界幾何與玩家實體
    PlayerSolid,
    /// 只有世界幾何
    WorldOnly,
}

impl TraceMask {
    fn code(self) -> u32 {
        match self {
            TraceMask::All => 0,
            TraceMask::PlayerSolid => 1,
            TraceMask::WorldOnly => 2,
        }
    }
}

/// 交給提供者的過濾條件，帶有觀察者資訊
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFilter {
    pub flags: FilterFlags,
    /// 觀察者識別碼
    pub owner: u64,
    /// 觀察者隊伍
    pub owner_team: i32,
}

impl TraceFilter {
    /// 判斷某個單位是否被過濾（射線穿透它）
    pub fn ignores(&self, identity: u64, team: i32, is_player: bool) -> bool {
        if self.flags.contains(FilterFlags::IGNORE_OWNER) && identity != 0 && identity == self.owner {
            return true;
        }
        if self.flags.contains(FilterFlags::IGNORE_PLAYERS) && is_player {
            return true;
        }
        if self.flags.contains(FilterFlags::IGNORE_FRIEND) && team == self.owner_team {
            return true;
        }
        if self.flags.contains(FilterFlags::IGNORE_ENEMY) && team != self.owner_team {
            return true;
        }
        false
    }
}

/// 單次查詢的完整參數
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub flags: QueryFlags,
    pub filter: FilterFlags,
    pub mask: TraceMask,
    pub ground_point: Option<Vec3<f32>>,
    pub path_steps: u32,
    pub soft_fudge: f32,
    pub capsule_radius: f32,
    pub head_height: f32,
}

impl QueryOptions {
    pub fn with_flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_ground_point(mut self, point: Vec3<f32>) -> Self {
        self.flags.insert(QueryFlags::GROUND_CHECK);
        self.ground_point = Some(point);
        self
    }

    pub fn with_filter(mut self, filter: FilterFlags) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_mask(mut self, mask: TraceMask) -> Self {
        self.mask = mask;
        self
    }

    /// WORLD_ONLY 旗標會覆蓋遮罩
    pub fn effective_mask(&self) -> TraceMask {
        if self.flags.contains(QueryFlags::WORLD_ONLY) {
            TraceMask::WorldOnly
        } else {
            self.mask
        }
    }

    pub fn effective_filter(&self) -> FilterFlags {
        if self.flags.contains(QueryFlags::IGNORE_PLAYERS) {
            self.filter | FilterFlags::IGNORE_PLAYERS
        } else {
            self.filter
        }
    }

    /// 緩存鍵使用的簽章：旗標、過濾、遮罩
    pub fn cache_signature(&self) -> u32 {
        u32::from(self.flags.bits())
            | (u32::from(self.effective_filter().bits()) << 16)
            | (self.effective_mask().code() << 24)
    }

    /// 結果是否與觀察方向無關（可用於網格緩存的對稱查詢）
    pub fn is_orientation_free(&self) -> bool {
        let relative = FilterFlags::IGNORE_OWNER | FilterFlags::IGNORE_FRIEND | FilterFlags::IGNORE_ENEMY;
        !self.effective_filter().intersects(relative) && !self.flags.contains(QueryFlags::GROUND_CHECK)
    }
}

/// 常用查詢組合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPreset {
    Default,
    /// 不使用軟性點雲
    Hard,
    OnPath,
    /// 忽略所有單位，只測世界幾何
    WorldOnlyHard,
}

impl QueryPreset {
    pub fn flags(self) -> QueryFlags {
        let default = QueryFlags::MULTI_PROBE | QueryFlags::SOFT_CLOUD | QueryFlags::USE_TTL_CACHE;
        match self {
            QueryPreset::Default => default,
            QueryPreset::Hard => default.without(QueryFlags::SOFT_CLOUD),
            QueryPreset::OnPath => default | QueryFlags::PATH_CHECK,
            QueryPreset::WorldOnlyHard => {
                default.without(QueryFlags::SOFT_CLOUD) | QueryFlags::WORLD_ONLY | QueryFlags::IGNORE_PLAYERS
            }
        }
    }
}

impl fmt::Display for QueryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryPreset::Default => "default",
            QueryPreset::Hard => "hard",
            QueryPreset::OnPath => "on_path",
            QueryPreset::WorldOnlyHard => "world_only_hard",
        };
        f.write_str(name)
    }
}
