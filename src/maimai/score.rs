use super::track::TrackId;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LevelIndex {
    Basic = 0,
    Advanced = 1,
    Expert = 2,
    Master = 3,
    ReMaster = 4,
}

impl LevelIndex {
    pub fn from_index(i: u8) -> Option<Self> {
        match i {
            0 => Some(LevelIndex::Basic),
            1 => Some(LevelIndex::Advanced),
            2 => Some(LevelIndex::Expert),
            3 => Some(LevelIndex::Master),
            4 => Some(LevelIndex::ReMaster),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            LevelIndex::Basic => "Basic",
            LevelIndex::Advanced => "Advanced",
            LevelIndex::Expert => "Expert",
            LevelIndex::Master => "Master",
            LevelIndex::ReMaster => "Re:Master",
        }
    }
}

/// 连击评价，机台 comboStatus: 0 无, 1 FC, 2 FC+, 3 AP, 4 AP+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcType {
    Fc,
    Fcp,
    Ap,
    App,
}

impl FcType {
    pub fn from_combo_status(status: u8) -> Option<Self> {
        [None, Some(Self::Fc), Some(Self::Fcp), Some(Self::Ap), Some(Self::App)]
            .get(status as usize)
            .copied()
            .flatten()
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            FcType::Fc => "fc",
            FcType::Fcp => "fcp",
            FcType::Ap => "ap",
            FcType::App => "app",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fc" => Some(FcType::Fc),
            "fcp" => Some(FcType::Fcp),
            "ap" => Some(FcType::Ap),
            "app" => Some(FcType::App),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FcType::Fc => "FC",
            FcType::Fcp => "FC+",
            FcType::Ap => "AP",
            FcType::App => "AP+",
        }
    }
}

/// 同步评价，机台 syncStatus: 0 无, 1 FS, 2 FS+, 3 FDX, 4 FDX+, 5 SYNC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Fs,
    Fsp,
    Fsd,
    Fsdp,
    Sync,
}

impl FsType {
    pub fn from_sync_status(status: u8) -> Option<Self> {
        [
            None,
            Some(Self::Fs),
            Some(Self::Fsp),
            Some(Self::Fsd),
            Some(Self::Fsdp),
            Some(Self::Sync),
        ]
        .get(status as usize)
        .copied()
        .flatten()
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            FsType::Fs => "fs",
            FsType::Fsp => "fsp",
            FsType::Fsd => "fsd",
            FsType::Fsdp => "fsdp",
            FsType::Sync => "sync",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fs" => Some(FsType::Fs),
            "fsp" => Some(FsType::Fsp),
            "fsd" | "fdx" => Some(FsType::Fsd),
            "fsdp" | "fdxp" => Some(FsType::Fsdp),
            "sync" => Some(FsType::Sync),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FsType::Fs => "FS",
            FsType::Fsp => "FS+",
            FsType::Fsd => "FDX",
            FsType::Fsdp => "FDX+",
            FsType::Sync => "SYNC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rate {
    D,
    C,
    B,
    Bb,
    Bbb,
    A,
    Aa,
    Aaa,
    S,
    Sp,
    Ss,
    Ssp,
    Sss,
    Sssp,
}

impl Rate {
    /// 达成率 (百分比) 对应的评级
    pub fn from_achievements(achievements: f64) -> Self {
        const TABLE: [(f64, Rate); 13] = [
            (100.5, Rate::Sssp),
            (100.0, Rate::Sss),
            (99.5, Rate::Ssp),
            (99.0, Rate::Ss),
            (98.0, Rate::Sp),
            (97.0, Rate::S),
            (94.0, Rate::Aaa),
            (90.0, Rate::Aa),
            (80.0, Rate::A),
            (75.0, Rate::Bbb),
            (70.0, Rate::Bb),
            (60.0, Rate::B),
            (50.0, Rate::C),
        ];
        TABLE
            .iter()
            .find(|(min, _)| achievements >= *min)
            .map(|(_, r)| *r)
            .unwrap_or(Rate::D)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rate::D => "D",
            Rate::C => "C",
            Rate::B => "B",
            Rate::Bb => "BB",
            Rate::Bbb => "BBB",
            Rate::A => "A",
            Rate::Aa => "AA",
            Rate::Aaa => "AAA",
            Rate::S => "S",
            Rate::Sp => "S+",
            Rate::Ss => "SS",
            Rate::Ssp => "SS+",
            Rate::Sss => "SSS",
            Rate::Sssp => "SSS+",
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 机台返回的单曲成绩 (user-music-detail)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcadeScore {
    pub music_id: u32,
    pub level: u8,
    /// 达成率 * 10000，例如 1005000 = 100.5%
    pub achievement: u32,
    #[serde(default)]
    pub combo_status: u8,
    #[serde(default)]
    pub sync_status: u8,
    #[serde(default)]
    pub deluxscore_max: u32,
    #[serde(default)]
    pub score_rank: u8,
    #[serde(default)]
    pub play_count: u32,
}

/// 统一的成绩表示
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub track: TrackId,
    pub level_index: LevelIndex,
    pub achievements: f64,
    pub fc: Option<FcType>,
    pub fs: Option<FsType>,
    pub dx_score: u32,
    pub play_count: u32,
    /// 查分器返回的单曲 Rating (机台成绩没有)
    pub dx_rating: Option<f64>,
    /// 谱面定数
    pub level_value: Option<f64>,
    pub title: Option<String>,
}

impl Score {
    /// 机台成绩 → 统一成绩。难度序号非法时丢弃。
    pub fn from_arcade(raw: &ArcadeScore) -> Option<Self> {
        Some(Self {
            track: TrackId::from_raw(raw.music_id),
            level_index: LevelIndex::from_index(raw.level)?,
            achievements: raw.achievement as f64 / 10000.0,
            fc: FcType::from_combo_status(raw.combo_status),
            fs: FsType::from_sync_status(raw.sync_status),
            dx_score: raw.deluxscore_max,
            play_count: raw.play_count,
            dx_rating: None,
            level_value: None,
            title: None,
        })
    }

    pub fn rate(&self) -> Rate {
        Rate::from_achievements(self.achievements)
    }
}

pub fn convert_arcade_scores(raw: &[ArcadeScore]) -> Vec<Score> {
    raw.iter().filter_map(Score::from_arcade).collect()
}

/// 查分器的 Best 50：旧版本 35 首 + 当前版本 15 首
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Best50 {
    pub rating: u32,
    pub b35: Vec<Score>,
    pub b15: Vec<Score>,
}

/// 机台玩家概要 (user-preview)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPreview {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub player_rating: u32,
}
