//! 曲目编号
//!
//! 机台与部分查分器用 `variant * 10000 + canonical` 表示同一首歌的不同谱面：
//! 0 为标准谱，1..=9 为 DX 谱，10 及以上为宴会场 (utage)。
//! 内部统一使用 `TrackId { canonical, variant }`，只在 I/O 边界做取模换算。

use std::fmt;

pub const VARIANT_BLOCK: u32 = 10000;

/// 规范化曲目编号：`raw >= 10000` 时取 `raw % 10000`
pub fn normalize(raw: u32) -> u32 {
    if raw >= VARIANT_BLOCK {
        raw % VARIANT_BLOCK
    } else {
        raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartKind {
    Standard,
    Deluxe,
    Utage,
}

impl ChartKind {
    /// 落雪的谱面类型字段
    pub fn lxns_name(&self) -> &'static str {
        match self {
            ChartKind::Standard => "standard",
            ChartKind::Deluxe => "dx",
            ChartKind::Utage => "utage",
        }
    }

    /// 水鱼的谱面类型字段
    pub fn divingfish_name(&self) -> &'static str {
        match self {
            ChartKind::Standard => "SD",
            ChartKind::Deluxe => "DX",
            ChartKind::Utage => "UTAGE",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "sd" => Some(ChartKind::Standard),
            "dx" => Some(ChartKind::Deluxe),
            "utage" => Some(ChartKind::Utage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId {
    pub canonical: u32,
    pub variant: u32,
}

impl TrackId {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            canonical: normalize(raw),
            variant: raw / VARIANT_BLOCK,
        }
    }

    /// 由规范编号与谱面类型构造 (落雪等只给出类型的来源)
    pub fn from_parts(canonical: u32, kind: ChartKind) -> Self {
        let canonical = normalize(canonical);
        let variant = match kind {
            ChartKind::Standard => 0,
            ChartKind::Deluxe => 1,
            ChartKind::Utage => 10,
        };
        Self { canonical, variant }
    }

    pub fn to_raw(&self) -> u32 {
        self.variant * VARIANT_BLOCK + self.canonical
    }

    pub fn kind(&self) -> ChartKind {
        match self.variant {
            0 => ChartKind::Standard,
            1..=9 => ChartKind::Deluxe,
            _ => ChartKind::Utage,
        }
    }

    pub fn is_variant(&self) -> bool {
        self.variant > 0
    }

    /// 发往查分器的编号：宴会场谱面查分器按原始编号索引，其余使用规范编号
    pub fn provider_id(&self) -> u32 {
        match self.kind() {
            ChartKind::Utage => self.to_raw(),
            _ => self.canonical,
        }
    }
}

impl fmt::Display for TrackId {
    /// 展示用编号，DX 谱显示为 1xxxx
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_identity_below_block() {
        for id in [0, 1, 834, 9999] {
            assert_eq!(normalize(id), id);
            assert!(!TrackId::from_raw(id).is_variant());
        }
    }

    #[test]
    fn normalize_strips_variant() {
        assert_eq!(normalize(10834), 834);
        assert_eq!(normalize(11451), 1451);
        assert_eq!(normalize(100018), 18);
        assert!(TrackId::from_raw(10834).is_variant());
    }

    #[test]
    fn raw_round_trips() {
        for raw in [8, 834, 10834, 11451, 100018, 109999] {
            assert_eq!(TrackId::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(TrackId::from_raw(834).kind(), ChartKind::Standard);
        assert_eq!(TrackId::from_raw(10834).kind(), ChartKind::Deluxe);
        assert_eq!(TrackId::from_raw(100018).kind(), ChartKind::Utage);
    }

    #[test]
    fn provider_and_display_ids() {
        let dx = TrackId::from_raw(10834);
        assert_eq!(dx.provider_id(), 834);
        assert_eq!(dx.to_string(), "10834");

        let utage = TrackId::from_raw(100018);
        assert_eq!(utage.provider_id(), 100018);

        assert_eq!(TrackId::from_parts(834, ChartKind::Deluxe), dx);
        assert_eq!(TrackId::from_parts(10834, ChartKind::Deluxe), dx);
    }

    #[test]
    fn wire_kind_names() {
        assert_eq!(ChartKind::from_wire("DX"), Some(ChartKind::Deluxe));
        assert_eq!(ChartKind::from_wire("SD"), Some(ChartKind::Standard));
        assert_eq!(ChartKind::from_wire("standard"), Some(ChartKind::Standard));
        assert_eq!(ChartKind::from_wire("???"), None);
    }
}
