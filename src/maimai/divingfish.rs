//! 水鱼查分器
//!
//! 上传成绩需要先用账号密码登录拿到 `jwt_token` cookie，曲名取自
//! `/music_data` 曲库，曲库里没有的谱面不上传。查询 Best 50 走
//! `/query/player`，配置了开发者 token 时附带 `Developer-Token`。

use super::backend::{ProviderIdentity, ScoreProvider};
use super::bind::{DivingFishCredential, ProviderKind};
use super::error::{RemoteError, ensure_success};
use super::score::{Best50, FcType, FsType, LevelIndex, Score};
use super::track::{ChartKind, TrackId};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TOKEN_COOKIE: &str = "jwt_token";

#[derive(Clone)]
pub struct DivingFishClient {
    client: Client,
    base_url: String,
    developer_token: Option<String>,
}

#[derive(Serialize)]
struct Record<'a> {
    achievements: f64,
    #[serde(rename = "dxScore")]
    dx_score: u32,
    fc: &'a str,
    fs: &'a str,
    level_index: u8,
    song_id: u32,
    #[serde(rename = "type")]
    kind: &'a str,
    title: &'a str,
}

impl<'a> Record<'a> {
    fn from_score(s: &'a Score, title: &'a str) -> Self {
        Self {
            achievements: s.achievements,
            dx_score: s.dx_score,
            fc: s.fc.map(|f| f.wire_name()).unwrap_or(""),
            fs: s.fs.map(|f| f.wire_name()).unwrap_or(""),
            level_index: s.level_index.index(),
            song_id: s.track.to_raw(),
            kind: s.track.kind().divingfish_name(),
            title,
        }
    }
}

/// 曲库条目。id 是带变体前缀的编号，旧数据里可能是字符串
#[derive(Deserialize)]
struct CatalogueEntry {
    id: serde_json::Value,
    title: String,
}

impl CatalogueEntry {
    fn raw_id(&self) -> Option<u32> {
        match &self.id {
            serde_json::Value::String(s) => s.parse().ok(),
            other => other.as_u64().and_then(|v| u32::try_from(v).ok()),
        }
    }
}

#[derive(Deserialize)]
struct ChartRecord {
    song_id: u32,
    level_index: u8,
    achievements: f64,
    #[serde(default)]
    fc: String,
    #[serde(default)]
    fs: String,
    #[serde(default, rename = "dxScore")]
    dx_score: u32,
    #[serde(default)]
    ra: Option<f64>,
    #[serde(default)]
    ds: Option<f64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl ChartRecord {
    fn into_score(self) -> Option<Score> {
        // song_id 已带变体前缀；只给出 DX 类型而编号没有前缀时按类型补上
        let track = match self.kind.as_deref().and_then(ChartKind::from_wire) {
            Some(kind) if self.song_id < super::track::VARIANT_BLOCK => {
                TrackId::from_parts(self.song_id, kind)
            }
            _ => TrackId::from_raw(self.song_id),
        };
        Some(Score {
            track,
            level_index: LevelIndex::from_index(self.level_index)?,
            achievements: self.achievements,
            fc: FcType::from_wire(&self.fc),
            fs: FsType::from_wire(&self.fs),
            dx_score: self.dx_score,
            play_count: 0,
            dx_rating: self.ra,
            level_value: self.ds,
            title: self.title,
        })
    }
}

#[derive(Deserialize, Default)]
struct Charts {
    #[serde(default)]
    sd: Vec<ChartRecord>,
    #[serde(default)]
    dx: Vec<ChartRecord>,
}

#[derive(Deserialize)]
struct PlayerResponse {
    #[serde(default)]
    rating: u32,
    #[serde(default)]
    charts: Charts,
}

impl DivingFishClient {
    pub fn new(client: Client, base_url: impl Into<String>, developer_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            developer_token: developer_token.filter(|t| !t.is_empty()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn credential(identity: &ProviderIdentity) -> Result<&DivingFishCredential, RemoteError> {
        match identity {
            ProviderIdentity::Credential(c) => Ok(c),
            ProviderIdentity::FriendCode(_) => {
                Err(RemoteError::transient("水鱼需要账号密码绑定"))
            }
        }
    }

    /// 编号 (含变体前缀) 到曲名
    async fn catalogue(&self) -> Result<HashMap<u32, String>, RemoteError> {
        let resp = self.client.get(self.url("/music_data")).send().await?;
        let entries = ensure_success(resp, "水鱼曲库")?
            .json::<Vec<CatalogueEntry>>()
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| Some((e.raw_id()?, e.title)))
            .collect())
    }

    /// 登录并返回 jwt_token
    async fn login(&self, credential: &DivingFishCredential) -> Result<String, RemoteError> {
        let resp = self
            .client
            .post(self.url("/login"))
            .json(credential)
            .send()
            .await?;
        let resp = ensure_success(resp, "水鱼登录")?;

        resp.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_token_cookie)
            .ok_or_else(|| RemoteError::transient("水鱼登录响应缺少 jwt_token"))
    }
}

fn parse_token_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == TOKEN_COOKIE && !value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl ScoreProvider for DivingFishClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DivingFish
    }

    async fn push_scores(
        &self,
        identity: &ProviderIdentity,
        scores: &[Score],
    ) -> Result<(), RemoteError> {
        let credential = Self::credential(identity)?;
        let token = self.login(credential).await?;
        let titles = self.catalogue().await?;

        let records: Vec<Record> = scores
            .iter()
            .filter_map(|s| {
                let title = titles.get(&s.track.to_raw())?;
                Some(Record::from_score(s, title))
            })
            .collect();
        if records.len() < scores.len() {
            debug!(
                target: "DivingFish",
                "曲库中缺少 {} 首谱面，已跳过",
                scores.len() - records.len()
            );
        }
        let resp = self
            .client
            .post(self.url("/player/update_records"))
            .header(COOKIE, format!("{}={}", TOKEN_COOKIE, token))
            .json(&records)
            .send()
            .await?;
        ensure_success(resp, "水鱼上传")?;
        Ok(())
    }

    async fn best50(&self, identity: &ProviderIdentity) -> Result<Best50, RemoteError> {
        let credential = Self::credential(identity)?;

        let mut req = self
            .client
            .post(self.url("/query/player"))
            .json(&serde_json::json!({ "username": credential.username, "b50": true }));
        if let Some(token) = &self.developer_token {
            req = req.header("Developer-Token", token);
        }

        let resp = ensure_success(req.send().await?, "水鱼 B50")?;
        let body = resp.json::<PlayerResponse>().await?;

        Ok(Best50 {
            rating: body.rating,
            b35: body.charts.sd.into_iter().filter_map(ChartRecord::into_score).collect(),
            b15: body.charts.dx.into_iter().filter_map(ChartRecord::into_score).collect(),
        })
    }
}
