//! 落雪查分器 (开发者 API v0)

use super::backend::{NewPlayer, PlayerDirectory, ProviderIdentity, ProviderPlayer, ScoreProvider};
use super::bind::ProviderKind;
use super::error::{RemoteError, ensure_success};
use super::score::{Best50, FcType, FsType, LevelIndex, Score};
use super::track::{ChartKind, TrackId, VARIANT_BLOCK};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 新档案的默认称号
const DEFAULT_TROPHY: &str = "新人出道";

#[derive(Clone)]
pub struct LxnsClient {
    client: Client,
    base_url: String,
    token: String,
}

/// 落雪统一的响应外壳
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self, context: &str) -> Result<Option<T>, RemoteError> {
        if self.success {
            return Ok(self.data);
        }
        match StatusCode::from_u16(self.code) {
            Ok(status) if status != StatusCode::OK => Err(RemoteError::from_status(status, context)),
            _ => Err(RemoteError::transient(format!(
                "{} 失败: {}",
                context,
                self.message.unwrap_or_default()
            ))),
        }
    }
}

#[derive(Serialize)]
struct UploadScore<'a> {
    id: u32,
    #[serde(rename = "type")]
    kind: &'a str,
    level_index: u8,
    achievements: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fs: Option<&'a str>,
    dx_score: u32,
}

impl<'a> UploadScore<'a> {
    fn from_score(s: &'a Score) -> Self {
        Self {
            id: s.track.provider_id(),
            kind: s.track.kind().lxns_name(),
            level_index: s.level_index.index(),
            achievements: s.achievements,
            fc: s.fc.map(|f| f.wire_name()),
            fs: s.fs.map(|f| f.wire_name()),
            dx_score: s.dx_score,
        }
    }
}

#[derive(Serialize)]
struct UploadBody<'a> {
    scores: Vec<UploadScore<'a>>,
}

#[derive(Deserialize)]
struct LxnsScore {
    id: u32,
    #[serde(default)]
    song_name: Option<String>,
    level_index: u8,
    achievements: f64,
    #[serde(default)]
    fc: Option<String>,
    #[serde(default)]
    fs: Option<String>,
    #[serde(default)]
    dx_score: u32,
    #[serde(default)]
    dx_rating: Option<f64>,
    #[serde(rename = "type")]
    kind: String,
}

impl LxnsScore {
    fn into_score(self) -> Option<Score> {
        let kind = ChartKind::from_wire(&self.kind)?;
        let track = if kind == ChartKind::Utage && self.id >= VARIANT_BLOCK {
            TrackId::from_raw(self.id)
        } else {
            TrackId::from_parts(self.id, kind)
        };
        Some(Score {
            track,
            level_index: LevelIndex::from_index(self.level_index)?,
            achievements: self.achievements,
            fc: self.fc.as_deref().and_then(FcType::from_wire),
            fs: self.fs.as_deref().and_then(FsType::from_wire),
            dx_score: self.dx_score,
            play_count: 0,
            dx_rating: self.dx_rating,
            level_value: None,
            title: self.song_name,
        })
    }
}

#[derive(Deserialize)]
struct Bests {
    #[serde(default)]
    standard_total: u32,
    #[serde(default)]
    dx_total: u32,
    #[serde(default)]
    standard: Vec<LxnsScore>,
    #[serde(default)]
    dx: Vec<LxnsScore>,
}

impl LxnsClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0/maimai{}", self.base_url, path)
    }

    fn friend_code(identity: &ProviderIdentity) -> Result<&str, RemoteError> {
        match identity {
            ProviderIdentity::FriendCode(code) => Ok(code),
            ProviderIdentity::Credential(_) => Err(RemoteError::transient("落雪需要好友码绑定")),
        }
    }

    /// 发送请求并拆开响应外壳。非 2xx 只看 HTTP 状态码，外壳里的 code 仅在 2xx 时参与分类。
    async fn call<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        context: &str,
    ) -> Result<Option<T>, RemoteError> {
        let resp = ensure_success(req.header(AUTHORIZATION, &self.token).send().await?, context)?;
        resp.json::<Envelope<T>>().await?.into_result(context)
    }
}

#[async_trait]
impl ScoreProvider for LxnsClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Lxns
    }

    async fn push_scores(
        &self,
        identity: &ProviderIdentity,
        scores: &[Score],
    ) -> Result<(), RemoteError> {
        let code = Self::friend_code(identity)?;
        let body = UploadBody {
            scores: scores.iter().map(UploadScore::from_score).collect(),
        };
        let req = self
            .client
            .post(self.url(&format!("/player/{}/scores", code)))
            .json(&body);
        self.call::<serde_json::Value>(req, "落雪上传").await?;
        Ok(())
    }

    async fn best50(&self, identity: &ProviderIdentity) -> Result<Best50, RemoteError> {
        let code = Self::friend_code(identity)?;
        let req = self.client.get(self.url(&format!("/player/{}/bests", code)));
        let bests: Bests = self
            .call(req, "落雪 B50")
            .await?
            .ok_or_else(|| RemoteError::transient("落雪 B50 响应缺少 data"))?;

        Ok(Best50 {
            rating: bests.standard_total + bests.dx_total,
            b35: bests.standard.into_iter().filter_map(LxnsScore::into_score).collect(),
            b15: bests.dx.into_iter().filter_map(LxnsScore::into_score).collect(),
        })
    }
}

#[async_trait]
impl PlayerDirectory for LxnsClient {
    async fn find_player(&self, friend_code: &str) -> Result<Option<ProviderPlayer>, RemoteError> {
        let req = self.client.get(self.url(&format!("/player/{}", friend_code)));
        match self.call::<serde_json::Value>(req, "落雪玩家查询").await {
            Ok(Some(raw)) => {
                let name = raw
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Some(ProviderPlayer { name, raw }))
            }
            Ok(None) | Err(RemoteError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_player(&self, player: &NewPlayer) -> Result<(), RemoteError> {
        let body = serde_json::json!({
            "name": player.name,
            "rating": 0,
            "friend_code": player.friend_code,
            "course_rank": 0,
            "class_rank": 0,
            "star": 0,
            "trophy_name": DEFAULT_TROPHY,
            "icon": { "id": 1 },
            "name_plate": { "id": 1 },
            "frame": { "id": 1 },
        });
        let req = self.client.post(self.url("/player")).json(&body);
        self.call::<serde_json::Value>(req, "落雪建档").await?;
        Ok(())
    }
}
