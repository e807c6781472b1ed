use super::backend::{
    ArcadeSource, IdentityBackend, NewPlayer, PlayerDirectory, ProviderIdentity, ProviderPlayer,
    ScoreProvider,
};
use super::bind::{Bind, BindType, DivingFishCredential, Profile, ProfileBindUpdate, ProviderKind};
use super::error::{BindError, RemoteError};
use super::score::{Best50, PlayerPreview, convert_arcade_scores};
use std::sync::Arc;
use uuid::Uuid;

/// 单个查分器的同步结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Updated,
    NotBound,
    MalformedCredential,
    /// 查分器上不存在该玩家
    RemoteNotFound,
    Failed(String),
}

impl ProviderOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, ProviderOutcome::Updated)
    }
}

/// 一次成绩同步的逐个查分器结果，顺序与请求顺序一致
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUpdateReport {
    pub outcomes: Vec<(ProviderKind, ProviderOutcome)>,
}

impl SourceUpdateReport {
    pub fn updated(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_updated())
            .map(|(k, _)| *k)
    }

    pub fn outcome(&self, kind: ProviderKind) -> Option<&ProviderOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LxnsCreateOutcome {
    /// 落雪上已有档案，返回玩家名
    AlreadyExists(String),
    Created(ProviderPlayer),
}

/// 绑定协调器。所有外部服务以 trait 对象注入，启动时构造一次。
pub struct BindResolver {
    identity: Arc<dyn IdentityBackend>,
    arcade: Arc<dyn ArcadeSource>,
    providers: Vec<Arc<dyn ScoreProvider>>,
    directory: Option<Arc<dyn PlayerDirectory>>,
}

impl BindResolver {
    pub fn new(identity: Arc<dyn IdentityBackend>, arcade: Arc<dyn ArcadeSource>) -> Self {
        Self {
            identity,
            arcade,
            providers: Vec::new(),
            directory: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ScoreProvider>) -> Self {
        self.providers.retain(|p| p.kind() != provider.kind());
        self.providers.push(provider);
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn PlayerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    fn provider(&self, kind: ProviderKind) -> Option<&Arc<dyn ScoreProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    /// QQ → UUID，不存在则创建。并发创建 (409) 时重新查询，保证收敛到同一个 UUID。
    pub async fn resolve_or_create_identity(&self, qq: &str) -> Result<Uuid, BindError> {
        if let Some(uuid) = self.identity.find_uuid(&BindType::Qq, qq).await? {
            return Ok(uuid);
        }

        match self.identity.create_by_qq(qq).await {
            Ok(uuid) => {
                info!(target: "Maimai", "为 QQ {} 创建了新用户 {}", qq, uuid);
                Ok(uuid)
            }
            Err(RemoteError::Conflict) => {
                debug!(target: "Maimai", "QQ {} 并发创建冲突，重新查询", qq);
                self.identity
                    .find_uuid(&BindType::Qq, qq)
                    .await?
                    .ok_or_else(|| RemoteError::transient("创建冲突后仍查不到用户").into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 添加绑定，不改变当前档案
    pub async fn add_bind(
        &self,
        uuid: Uuid,
        bind_type: BindType,
        content: &str,
        name: Option<&str>,
    ) -> Result<Bind, BindError> {
        Ok(self.identity.add_bind(uuid, &bind_type, content, name).await?)
    }

    /// 通过二维码解析机台 UID 后添加国服账号绑定
    pub async fn add_arcade_bind(
        &self,
        uuid: Uuid,
        qr_code: &str,
        name: Option<&str>,
    ) -> Result<Bind, BindError> {
        let uid = self.uid_from_qr(qr_code).await?;
        self.add_bind(uuid, BindType::MaimaiCn, &uid.to_string(), name)
            .await
    }

    pub async fn add_divingfish_bind(
        &self,
        uuid: Uuid,
        credential: &DivingFishCredential,
        name: Option<&str>,
    ) -> Result<Bind, BindError> {
        Ok(self
            .identity
            .add_divingfish_bind(uuid, credential, name)
            .await?)
    }

    pub async fn uid_from_qr(&self, qr_code: &str) -> Result<u64, BindError> {
        Ok(self.arcade.uid_from_qr(qr_code).await?)
    }

    pub async fn get_current_profile(&self, uuid: Uuid) -> Result<Option<Profile>, BindError> {
        let binds = self.identity.current_binds(uuid).await;
        profile_from(binds)
    }

    /// 切换当前档案；`None` 表示没有该名称的档案
    pub async fn switch_current_profile(
        &self,
        uuid: Uuid,
        bind_name: &str,
    ) -> Result<Option<Profile>, BindError> {
        let binds = self.identity.switch_current_bind(uuid, bind_name).await;
        profile_from(binds)
    }

    pub async fn update_current_profile_binds(
        &self,
        uuid: Uuid,
        update: &ProfileBindUpdate,
    ) -> Result<Option<Profile>, BindError> {
        let binds = self.identity.update_current_binds(uuid, update).await;
        profile_from(binds)
    }

    /// 拉取一次机台成绩，推送到所选查分器 (为空则全部)。
    /// 每个查分器的结果独立记录，部分成功不回滚。
    /// 档案上一个查分器都没有绑定时直接返回，不访问机台。
    pub async fn reconcile_scores(
        &self,
        uuid: Uuid,
        kinds: &[ProviderKind],
    ) -> Result<SourceUpdateReport, BindError> {
        let profile = self
            .get_current_profile(uuid)
            .await?
            .ok_or(BindError::NoProfile)?;
        let uid = profile.arcade_uid()?;
        if ProviderKind::ALL.iter().all(|k| profile.bind_of(*k).is_none()) {
            return Err(BindError::NoProviderBound);
        }

        let selected: Vec<ProviderKind> = if kinds.is_empty() {
            ProviderKind::ALL.to_vec()
        } else {
            let mut v: Vec<ProviderKind> = Vec::with_capacity(kinds.len());
            for k in kinds {
                if !v.contains(k) {
                    v.push(*k);
                }
            }
            v
        };

        if selected.iter().all(|k| profile.bind_of(*k).is_none()) {
            return Ok(SourceUpdateReport {
                outcomes: selected
                    .into_iter()
                    .map(|k| (k, ProviderOutcome::NotBound))
                    .collect(),
            });
        }

        let raw = self.arcade.scores(uid).await?;
        let scores = convert_arcade_scores(&raw);
        debug!(target: "Maimai", "UID {} 共 {} 条机台成绩", uid, scores.len());

        let mut report = SourceUpdateReport::default();
        for kind in selected {
            let outcome = match identity_for(&profile, kind) {
                Err(BindError::NotBound(_)) => ProviderOutcome::NotBound,
                Err(BindError::MalformedCredential(_)) => ProviderOutcome::MalformedCredential,
                Err(e) => ProviderOutcome::Failed(e.to_string()),
                Ok(identity) => match self.provider(kind) {
                    None => ProviderOutcome::Failed(BindError::ProviderUnavailable(kind).to_string()),
                    Some(provider) => match provider.push_scores(&identity, &scores).await {
                        Ok(()) => ProviderOutcome::Updated,
                        Err(RemoteError::NotFound) => ProviderOutcome::RemoteNotFound,
                        Err(e) => {
                            warn!(target: "Maimai", "推送成绩到{}失败: {}", kind, e);
                            ProviderOutcome::Failed(e.to_string())
                        }
                    },
                },
            };
            report.outcomes.push((kind, outcome));
        }

        Ok(report)
    }

    /// 档案在指定查分器上的 Best 50
    pub async fn best50(&self, profile: &Profile, kind: ProviderKind) -> Result<Best50, BindError> {
        let identity = identity_for(profile, kind)?;
        let provider = self
            .provider(kind)
            .ok_or(BindError::ProviderUnavailable(kind))?;
        Ok(provider.best50(&identity).await?)
    }

    pub async fn player_preview(&self, profile: &Profile) -> Result<PlayerPreview, BindError> {
        let uid = profile.arcade_uid()?;
        Ok(self.arcade.preview(uid).await?)
    }

    /// 用当前档案的机台玩家名在落雪上建档。已存在时不做任何修改。
    pub async fn create_lxns_profile(&self, uuid: Uuid) -> Result<LxnsCreateOutcome, BindError> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(BindError::ProviderUnavailable(ProviderKind::Lxns))?;
        let profile = self
            .get_current_profile(uuid)
            .await?
            .ok_or(BindError::NoProfile)?;
        let friend_code = profile
            .bind_of(ProviderKind::Lxns)
            .ok_or(BindError::NotBound(ProviderKind::Lxns))?
            .bind_content
            .trim()
            .to_string();

        if let Some(player) = directory.find_player(&friend_code).await? {
            return Ok(LxnsCreateOutcome::AlreadyExists(player.name));
        }

        let code: u64 = friend_code
            .parse()
            .map_err(|_| BindError::MalformedCredential(ProviderKind::Lxns))?;
        let preview = self.player_preview(&profile).await?;
        directory
            .create_player(&NewPlayer {
                name: preview.user_name,
                friend_code: code,
            })
            .await?;

        let created = directory
            .find_player(&friend_code)
            .await?
            .ok_or_else(|| RemoteError::transient("落雪建档后查询不到玩家"))?;
        info!(target: "Maimai", "已在落雪创建玩家 {}", created.name);
        Ok(LxnsCreateOutcome::Created(created))
    }
}

/// 远端 404 视为"没有当前档案"
fn profile_from(binds: Result<Vec<Bind>, RemoteError>) -> Result<Option<Profile>, BindError> {
    match binds {
        Ok(binds) => Ok(Profile::from_binds(binds)),
        Err(RemoteError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 档案上某个查分器的身份
pub fn identity_for(profile: &Profile, kind: ProviderKind) -> Result<ProviderIdentity, BindError> {
    let bind = profile.bind_of(kind).ok_or(BindError::NotBound(kind))?;
    match kind {
        ProviderKind::DivingFish => {
            DivingFishCredential::parse(&bind.bind_content).map(ProviderIdentity::Credential)
        }
        ProviderKind::Lxns => {
            let code = bind.bind_content.trim();
            if code.is_empty() {
                Err(BindError::MalformedCredential(kind))
            } else {
                Ok(ProviderIdentity::FriendCode(code.to_string()))
            }
        }
    }
}
