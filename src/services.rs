//! 启动时构建一次的共享服务，经 `Runtime` 注入每个 `Context`

use crate::config::{AppConfig, ServiceConfig};
use crate::maimai::divingfish::DivingFishClient;
use crate::maimai::lxns::LxnsClient;
use crate::maimai::{BindResolver, RemiClient};
use crate::permission::PermissionManager;
use crate::permission::store::PolicyStore;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// 数据库连接只由策略表持有
pub struct Services {
    pub permission: PermissionManager,
    pub binds: BindResolver,
}

impl Services {
    /// 权限模型加载失败不会中断启动 (评估器放行并记录错误)，
    /// HTTP 客户端构建失败则直接返回错误。
    pub async fn build(config: &AppConfig, db: DatabaseConnection) -> Result<Self, ServiceError> {
        let permission =
            PermissionManager::load(PolicyStore::new(db), &config.permission.model_path)
                .await;
        let binds = build_resolver(&config.services)?;

        Ok(Self { permission, binds })
    }
}

pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// 落雪没有配置开发者 token 时不注册 (查询与建档都需要 token)
fn build_resolver(cfg: &ServiceConfig) -> Result<BindResolver, reqwest::Error> {
    let client = http_client(cfg.request_timeout_secs)?;

    let remi = Arc::new(RemiClient::new(client.clone(), &cfg.remi_base_url));
    let divingfish = Arc::new(DivingFishClient::new(
        client.clone(),
        &cfg.divingfish_base_url,
        Some(cfg.divingfish_developer_token.clone()),
    ));

    let mut resolver = BindResolver::new(remi.clone(), remi).with_provider(divingfish);

    if cfg.lxns_developer_token.is_empty() {
        warn!(target: "Services", "未配置落雪开发者 token，落雪相关功能不可用");
    } else {
        let lxns = Arc::new(LxnsClient::new(
            client,
            &cfg.lxns_base_url,
            &cfg.lxns_developer_token,
        ));
        resolver = resolver.with_provider(lxns.clone()).with_directory(lxns);
    }

    Ok(resolver)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use std::path::PathBuf;

    /// 使用内存数据库与给定模型文件构建服务，外部地址指向不可达端口
    pub async fn services_with_model(model_path: PathBuf) -> Services {
        let db = db::memory().await;
        let mut config = AppConfig::default();
        config.permission.model_path = model_path.to_string_lossy().to_string();
        config.services.remi_base_url = "http://127.0.0.1:9".into();
        config.services.request_timeout_secs = 1;
        Services::build(&config, db).await.unwrap()
    }

    #[tokio::test]
    async fn builds_without_lxns_token() {
        let dir = tempfile::tempdir().unwrap();
        let services = services_with_model(dir.path().join("missing.toml")).await;
        // 模型不存在：评估器未就绪，放行
        assert!(!services.permission.is_ready());
    }
}
