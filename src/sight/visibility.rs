use std::fmt;

/// 不可見（或可見）的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SightReason {
    Visible,
    Dead,
    Ground,
    Path,
    Blocked,
}

impl SightReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SightReason::Visible => "",
            SightReason::Dead => "dead",
            SightReason::Ground => "ground",
            SightReason::Path => "path",
            SightReason::Blocked => "blocked",
        }
    }
}

impl fmt::Display for SightReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 查詢結果，三層緩存存的也是這個值，命中時原因不變
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub visible: bool,
    pub reason: SightReason,
}

impl Visibility {
    pub const VISIBLE: Visibility = Visibility { visible: true, reason: SightReason::Visible };

    pub fn blocked(reason: SightReason) -> Self {
        Self { visible: false, reason }
    }

    pub fn into_tuple(self) -> (bool, &'static str) {
        (self.visible, self.reason.as_str())
    }
}
