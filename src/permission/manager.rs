use super::model::{PolicyRow, PolicySet, RoleModel};
use super::store::PolicyStore;
use super::{ADMIN_ROLE, Scope, Subject};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("读取角色模型失败 ({path}): {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("角色模型格式错误 ({path}): {source}")]
    Model {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("策略表读写失败: {0}")]
    Store(#[from] sea_orm::DbErr),
}

/// 权限判定入口。
///
/// 规则集以 `Arc<PolicySet>` 的形式整体替换；每次判定先取一份快照，
/// 因此重载期间的判定要么看到旧规则要么看到新规则，不会看到半成品。
/// 写操作与重载由一把异步锁串行化。
pub struct PermissionManager {
    model_path: PathBuf,
    store: PolicyStore,
    state: RwLock<Option<Arc<PolicySet>>>,
    write_lock: AsyncMutex<()>,
}

impl PermissionManager {
    /// 构造但不加载。未加载时判定放行、写操作与列表查询全部失败。
    pub fn new(store: PolicyStore, model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            store,
            state: RwLock::new(None),
            write_lock: AsyncMutex::new(()),
        }
    }

    /// 构造并尝试加载；加载失败只记录错误，之后可通过 reload 恢复
    pub async fn load(store: PolicyStore, model_path: impl Into<PathBuf>) -> Self {
        let manager = Self::new(store, model_path);
        if let Err(e) = manager.store.init().await {
            error!(target: "Permission", "初始化策略表失败: {}", e);
        }
        if !manager.reload().await {
            error!(
                target: "Permission",
                "权限系统未就绪，所有权限检查将默认放行，修复后请执行 reload"
            );
        }
        manager
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    fn snapshot(&self) -> Option<Arc<PolicySet>> {
        self.state.read().ok().and_then(|guard| guard.clone())
    }

    fn swap(&self, set: PolicySet) {
        if let Ok(mut guard) = self.state.write() {
            *guard = Some(Arc::new(set));
        }
    }

    async fn build(&self) -> Result<PolicySet, PolicyError> {
        let model = read_model(&self.model_path).await?;
        let rows = self.store.load().await?;
        Ok(PolicySet::build(model, rows))
    }

    /// 重新读取角色模型与策略表并原子替换。失败时保留原规则集。
    pub async fn reload(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.build().await {
            Ok(set) => {
                info!(
                    target: "Permission",
                    "权限策略已加载: {} 个角色, {} 条记录",
                    set.model().roles.len(),
                    set.rows().len()
                );
                self.swap(set);
                true
            }
            Err(e) => {
                error!(target: "Permission", "{}", e);
                false
            }
        }
    }

    pub fn evaluate(&self, subject: &Subject, resource: &str, action: &str) -> bool {
        let Some(set) = self.snapshot() else {
            warn!(
                target: "Permission",
                "权限系统未初始化，放行 {} -> {}:{}",
                subject.key(),
                resource,
                action
            );
            return true;
        };
        let allowed = set.evaluate(subject, resource, action);
        debug!(
            target: "Permission",
            "{} [{}] -> {}:{} = {}",
            subject.key(),
            subject.scope,
            resource,
            action,
            allowed
        );
        allowed
    }

    /// 写入一行并更新内存规则集。present = false 表示删除。
    async fn mutate(&self, row: PolicyRow, present: bool) -> bool {
        let _guard = self.write_lock.lock().await;
        let Some(current) = self.snapshot() else {
            warn!(target: "Permission", "权限系统未初始化，拒绝修改策略");
            return false;
        };

        let changed = if present {
            self.store.insert(&row).await
        } else {
            self.store.delete(&row).await
        };

        match changed {
            Ok(true) => {
                self.swap(current.with_row(row, present));
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(target: "Permission", "策略表写入失败: {}", e);
                false
            }
        }
    }

    pub async fn grant_role(
        &self,
        user_id: &str,
        role: &str,
        scope: Scope,
        scope_id: Option<&str>,
    ) -> bool {
        self.mutate(PolicyRow::role(user_id, role, scope, scope_id), true)
            .await
    }

    pub async fn revoke_role(
        &self,
        user_id: &str,
        role: &str,
        scope: Scope,
        scope_id: Option<&str>,
    ) -> bool {
        self.mutate(PolicyRow::role(user_id, role, scope, scope_id), false)
            .await
    }

    pub fn list_roles(&self, user_id: &str, scope: Scope, scope_id: Option<&str>) -> BTreeSet<String> {
        self.snapshot()
            .map(|set| set.roles_of(user_id, scope, scope_id).into_iter().collect())
            .unwrap_or_default()
    }

    pub fn list_subjects_for_role(
        &self,
        role: &str,
        scope: Scope,
        scope_id: Option<&str>,
    ) -> BTreeSet<Subject> {
        self.snapshot()
            .map(|set| set.holders_of(role, scope, scope_id).into_iter().collect())
            .unwrap_or_default()
    }

    pub async fn add_blacklist(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
        scope: Scope,
        scope_id: Option<&str>,
    ) -> bool {
        let object = format!("{}:{}", resource, action);
        self.mutate(PolicyRow::deny(user_id, &object, scope, scope_id), true)
            .await
    }

    pub async fn remove_blacklist(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
        scope: Scope,
        scope_id: Option<&str>,
    ) -> bool {
        let object = format!("{}:{}", resource, action);
        self.mutate(PolicyRow::deny(user_id, &object, scope, scope_id), false)
            .await
    }

    pub fn list_blacklist(&self, user_id: &str, scope: Scope, scope_id: Option<&str>) -> Vec<String> {
        let mut items = self
            .snapshot()
            .map(|set| set.denials_of(user_id, scope, scope_id))
            .unwrap_or_default();
        items.sort();
        items.dedup();
        items
    }

    /// 管理员判定 (不经过 evaluate)。
    ///
    /// 群内：该群 (或通配) 下任一以 `admin` 开头的角色，或全局 `admin`；
    /// 私聊与全局：只看全局 `admin`。
    pub fn is_admin(&self, user_id: &str, scope: Scope, scope_id: Option<&str>) -> bool {
        if scope == Scope::Group
            && self
                .list_roles(user_id, Scope::Group, scope_id)
                .iter()
                .any(|r| r.starts_with(ADMIN_ROLE))
        {
            return true;
        }
        self.list_roles(user_id, Scope::Global, None)
            .contains(ADMIN_ROLE)
    }
}

async fn read_model(path: &Path) -> Result<RoleModel, PolicyError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    RoleModel::parse(&content).map_err(|source| PolicyError::Model {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MODEL: &str = r#"
        [roles.admin]
        allow = ["*"]

        [roles.member]
        allow = ["maicn:*", "lxns:*", "divingfish:*"]
        scopes = ["group", "private"]
    "#;

    fn model_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    async fn manager(model: &NamedTempFile) -> PermissionManager {
        PermissionManager::load(PolicyStore::new(db::memory().await), model.path()).await
    }

    #[tokio::test]
    async fn missing_model_fails_open_for_checks_closed_for_writes() {
        let store = PolicyStore::new(db::memory().await);
        let m = PermissionManager::load(store, "/nonexistent/model.toml").await;

        assert!(!m.is_ready());
        assert!(m.evaluate(&Subject::group("1", "100"), "maicn", "add"));
        assert!(!m.grant_role("1", "member", Scope::Group, None).await);
        assert!(m.list_roles("1", Scope::Group, None).is_empty());
        assert!(!m.is_admin("1", Scope::Global, None));
    }

    #[tokio::test]
    async fn corrupt_model_is_not_loaded() {
        let file = model_file("[roles.admin\nallow = ");
        let m = manager(&file).await;
        assert!(!m.is_ready());
        assert!(!m.reload().await);
    }

    #[tokio::test]
    async fn grants_are_idempotent() {
        let file = model_file(MODEL);
        let m = manager(&file).await;

        assert!(m.grant_role("1", "member", Scope::Group, Some("100")).await);
        assert!(!m.grant_role("1", "member", Scope::Group, Some("100")).await);
        assert_eq!(
            m.list_roles("1", Scope::Group, Some("100")),
            BTreeSet::from(["member".to_string()])
        );

        assert!(m.revoke_role("1", "member", Scope::Group, Some("100")).await);
        assert!(!m.revoke_role("1", "member", Scope::Group, Some("100")).await);
        assert!(m.list_roles("1", Scope::Group, Some("100")).is_empty());
    }

    #[tokio::test]
    async fn group_blacklist_beats_member_role() {
        let file = model_file(MODEL);
        let m = manager(&file).await;

        m.grant_role("42", "member", Scope::Group, None).await;
        let in_group = Subject::group("42", "1000");
        assert!(m.evaluate(&in_group, "maicn", "update"));

        assert!(m.add_blacklist("42", "maicn", "update", Scope::Group, Some("1000")).await);
        assert!(!m.evaluate(&in_group, "maicn", "update"));
        assert!(m.evaluate(&in_group, "maicn", "b50"));
        assert!(m.evaluate(&Subject::group("42", "2000"), "maicn", "update"));
        assert_eq!(
            m.list_blacklist("42", Scope::Group, Some("1000")),
            vec!["maicn:update".to_string()]
        );

        assert!(m.remove_blacklist("42", "maicn", "update", Scope::Group, Some("1000")).await);
        assert!(m.evaluate(&in_group, "maicn", "update"));
    }

    #[tokio::test]
    async fn subjects_for_role_respect_wildcards() {
        let file = model_file(MODEL);
        let m = manager(&file).await;

        m.grant_role("1", "member", Scope::Group, Some("100")).await;
        m.grant_role("2", "member", Scope::Group, None).await;
        m.grant_role("3", "member", Scope::Group, Some("200")).await;

        let keys: Vec<String> = m
            .list_subjects_for_role("member", Scope::Group, Some("100"))
            .iter()
            .map(Subject::key)
            .collect();
        assert_eq!(keys, vec!["1@100", "2@*"]);
        assert_eq!(m.list_subjects_for_role("member", Scope::Group, None).len(), 3);
    }

    #[tokio::test]
    async fn admin_in_group_and_global() {
        let file = model_file(MODEL);
        let m = manager(&file).await;

        m.grant_role("1", "admin_group", Scope::Group, Some("100")).await;
        assert!(m.is_admin("1", Scope::Group, Some("100")));
        assert!(!m.is_admin("1", Scope::Group, Some("200")));
        assert!(!m.is_admin("1", Scope::Private, None));

        m.grant_role("2", "admin", Scope::Global, None).await;
        assert!(m.is_admin("2", Scope::Group, Some("100")));
        assert!(m.is_admin("2", Scope::Private, None));
        assert!(m.is_admin("2", Scope::Global, None));
    }

    #[tokio::test]
    async fn reload_picks_up_model_changes_and_recovers() {
        let file = model_file("");
        let m = PermissionManager::load(PolicyStore::new(db::memory().await), file.path()).await;
        m.grant_role("1", "member", Scope::Private, None).await;
        assert!(!m.evaluate(&Subject::private("1"), "maicn", "add"));

        std::fs::write(file.path(), MODEL).unwrap();
        assert!(m.reload().await);
        assert!(m.evaluate(&Subject::private("1"), "maicn", "add"));
    }

    #[tokio::test]
    async fn reload_recovers_failed_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let m = PermissionManager::load(PolicyStore::new(db::memory().await), &path).await;
        assert!(!m.is_ready());

        std::fs::write(&path, MODEL).unwrap();
        assert!(m.reload().await);
        assert!(m.is_ready());
        assert!(!m.evaluate(&Subject::private("1"), "maicn", "add"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_see_whole_rulesets_during_reload() {
        const OPEN: &str = r#"
            [roles.member]
            allow = ["maicn:*", "lxns:*"]
        "#;
        const CLOSED: &str = r#"
            [roles.member]
            allow = ["divingfish:*"]
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, OPEN).unwrap();
        let m = Arc::new(
            PermissionManager::load(PolicyStore::new(db::memory().await), &path).await,
        );
        m.grant_role("7", "member", Scope::Private, None).await;

        let reloader = {
            let (m, dir, path) = (m.clone(), dir.path().to_path_buf(), path.clone());
            tokio::spawn(async move {
                for i in 0..200 {
                    // 先写临时文件再改名，读到的总是完整文件
                    let staged = dir.join("model.toml.next");
                    std::fs::write(&staged, if i % 2 == 0 { CLOSED } else { OPEN }).unwrap();
                    std::fs::rename(&staged, &path).unwrap();
                    assert!(m.reload().await);
                }
            })
        };

        let checkers: Vec<_> = (0..4)
            .map(|_| {
                let m = m.clone();
                tokio::spawn(async move {
                    let member = Subject::private("7");
                    let stranger = Subject::private("8");
                    for _ in 0..2000 {
                        let set = m.snapshot().unwrap();
                        let seen = (
                            set.evaluate(&member, "maicn", "add"),
                            set.evaluate(&member, "lxns", "update"),
                            set.evaluate(&member, "divingfish", "update"),
                        );
                        assert!(
                            seen == (true, true, false) || seen == (false, false, true),
                            "混合规则集: {:?}",
                            seen
                        );
                        // 重载期间不会退回未加载时的放行状态
                        assert!(!m.evaluate(&stranger, "maicn", "add"));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        reloader.await.unwrap();
        for c in checkers {
            c.await.unwrap();
        }
        // 偶数轮写 CLOSED，最后一轮 (199) 写 OPEN
        assert!(m.evaluate(&Subject::private("7"), "maicn", "add"));
    }
}
