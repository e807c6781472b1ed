//! 外部服务的抽象边界。HTTP 实现见 `remi`、`divingfish`、`lxns`，
//! 测试中用内存实现替换。

use super::bind::{Bind, BindType, DivingFishCredential, ProfileBindUpdate, ProviderKind};
use super::error::RemoteError;
use super::score::{ArcadeScore, Best50, PlayerPreview, Score};
use async_trait::async_trait;
use uuid::Uuid;

/// Remi 身份与绑定服务
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn find_uuid(&self, bind_type: &BindType, content: &str)
    -> Result<Option<Uuid>, RemoteError>;

    /// 409 时返回 `RemoteError::Conflict`
    async fn create_by_qq(&self, qq: &str) -> Result<Uuid, RemoteError>;

    async fn add_bind(
        &self,
        uuid: Uuid,
        bind_type: &BindType,
        content: &str,
        name: Option<&str>,
    ) -> Result<Bind, RemoteError>;

    async fn add_divingfish_bind(
        &self,
        uuid: Uuid,
        credential: &DivingFishCredential,
        name: Option<&str>,
    ) -> Result<Bind, RemoteError>;

    async fn current_binds(&self, uuid: Uuid) -> Result<Vec<Bind>, RemoteError>;

    async fn update_current_binds(
        &self,
        uuid: Uuid,
        update: &ProfileBindUpdate,
    ) -> Result<Vec<Bind>, RemoteError>;

    async fn switch_current_bind(&self, uuid: Uuid, bind_name: &str)
    -> Result<Vec<Bind>, RemoteError>;
}

/// 机台数据网关
#[async_trait]
pub trait ArcadeSource: Send + Sync {
    async fn uid_from_qr(&self, qr_code: &str) -> Result<u64, RemoteError>;
    async fn scores(&self, uid: u64) -> Result<Vec<ArcadeScore>, RemoteError>;
    async fn preview(&self, uid: u64) -> Result<PlayerPreview, RemoteError>;
}

/// 查分器上的玩家身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderIdentity {
    Credential(DivingFishCredential),
    FriendCode(String),
}

#[async_trait]
pub trait ScoreProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    async fn push_scores(
        &self,
        identity: &ProviderIdentity,
        scores: &[Score],
    ) -> Result<(), RemoteError>;
    async fn best50(&self, identity: &ProviderIdentity) -> Result<Best50, RemoteError>;
}

/// 查分器玩家档案
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPlayer {
    pub name: String,
    pub raw: serde_json::Value,
}

/// 新建档案所需的最少信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub name: String,
    pub friend_code: u64,
}

/// 可以查询/创建玩家档案的查分器 (落雪)
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn find_player(&self, friend_code: &str) -> Result<Option<ProviderPlayer>, RemoteError>;
    async fn create_player(&self, player: &NewPlayer) -> Result<(), RemoteError>;
}
