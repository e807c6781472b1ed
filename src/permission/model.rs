use super::{Scope, Subject, WILDCARD};
use serde::Deserialize;
use std::collections::BTreeMap;

/// 角色模型文件，例如:
///
/// ```toml
/// [roles.member]
/// allow = ["maicn:*", "lxns:*"]
/// scopes = ["group", "private"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleModel {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleGrant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleGrant {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    /// 省略时对所有作用域生效
    #[serde(default)]
    pub scopes: Option<Vec<Scope>>,
}

impl RoleModel {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(String),
    Role(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub principal: Principal,
    pub object: String,
    pub scope: Scope,
    pub scope_id: String,
    pub effect: Effect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Role,
    Deny,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Role => "role",
            RowKind::Deny => "deny",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "role" => Some(RowKind::Role),
            "deny" => Some(RowKind::Deny),
            _ => None,
        }
    }
}

/// 策略表中的一行：角色分配 (value = 角色名) 或黑名单 (value = resource:action)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRow {
    pub kind: RowKind,
    pub user_id: String,
    pub value: String,
    pub scope: Scope,
    pub scope_id: String,
}

impl PolicyRow {
    pub fn role(user_id: &str, role: &str, scope: Scope, scope_id: Option<&str>) -> Self {
        Self::new(RowKind::Role, user_id, role, scope, scope_id)
    }

    pub fn deny(user_id: &str, object: &str, scope: Scope, scope_id: Option<&str>) -> Self {
        Self::new(RowKind::Deny, user_id, object, scope, scope_id)
    }

    fn new(kind: RowKind, user_id: &str, value: &str, scope: Scope, scope_id: Option<&str>) -> Self {
        Self {
            kind,
            user_id: user_id.to_string(),
            value: value.to_string(),
            scope,
            scope_id: scope_id.unwrap_or(WILDCARD).to_string(),
        }
    }

    /// 列表查询：不带 scope_id 时可见该作用域全部行
    fn visible_to(&self, scope: Scope, scope_id: Option<&str>) -> bool {
        self.scope == scope
            && match scope_id {
                None => true,
                Some(id) => self.scope_id == WILDCARD || self.scope_id == id,
            }
    }
}

/// 判定：请求不带 scope_id 时只命中通配行
fn scope_id_matches(rule_scope_id: &str, requested: Option<&str>) -> bool {
    rule_scope_id == WILDCARD || Some(rule_scope_id) == requested
}

/// `*` 匹配一切，`resource:*` 匹配该资源的任意动作
pub fn object_matches(pattern: &str, object: &str) -> bool {
    if pattern == WILDCARD || pattern == object {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => object.starts_with(prefix),
        _ => false,
    }
}

/// 一份完整、不可变的规则集。重载时整体替换。
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    model: RoleModel,
    rows: Vec<PolicyRow>,
    rules: Vec<PolicyRule>,
}

impl PolicySet {
    pub fn build(model: RoleModel, rows: Vec<PolicyRow>) -> Self {
        let mut rules = Vec::new();

        for (role, grant) in &model.roles {
            let scopes = grant.scopes.clone().unwrap_or_else(|| Scope::ALL.to_vec());
            for scope in scopes {
                let effects = grant
                    .allow
                    .iter()
                    .map(|o| (o, Effect::Allow))
                    .chain(grant.deny.iter().map(|o| (o, Effect::Deny)));
                for (object, effect) in effects {
                    rules.push(PolicyRule {
                        principal: Principal::Role(role.clone()),
                        object: object.clone(),
                        scope,
                        scope_id: WILDCARD.to_string(),
                        effect,
                    });
                }
            }
        }

        for row in rows.iter().filter(|r| r.kind == RowKind::Deny) {
            rules.push(PolicyRule {
                principal: Principal::User(row.user_id.clone()),
                object: row.value.clone(),
                scope: row.scope,
                scope_id: row.scope_id.clone(),
                effect: Effect::Deny,
            });
        }

        Self { model, rows, rules }
    }

    pub fn model(&self) -> &RoleModel {
        &self.model
    }

    pub fn rows(&self) -> &[PolicyRow] {
        &self.rows
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// 在当前规则集基础上增删一行，得到新规则集
    pub fn with_row(&self, row: PolicyRow, present: bool) -> Self {
        let mut rows: Vec<PolicyRow> = self.rows.iter().filter(|r| **r != row).cloned().collect();
        if present {
            rows.push(row);
        }
        Self::build(self.model.clone(), rows)
    }

    /// 判定时使用的角色：同作用域、scope_id 相同或为通配
    fn effective_roles(&self, subject: &Subject) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| {
                r.kind == RowKind::Role
                    && r.user_id == subject.user_id
                    && r.scope == subject.scope
                    && scope_id_matches(&r.scope_id, subject.scope_id())
            })
            .map(|r| r.value.as_str())
            .collect()
    }

    pub fn evaluate(&self, subject: &Subject, resource: &str, action: &str) -> bool {
        let object = format!("{}:{}", resource, action);
        let roles = self.effective_roles(subject);

        let applies = |rule: &&PolicyRule| {
            rule.scope == subject.scope
                && scope_id_matches(&rule.scope_id, subject.scope_id())
                && object_matches(&rule.object, &object)
                && match &rule.principal {
                    Principal::User(u) => *u == subject.user_id,
                    Principal::Role(r) => roles.contains(&r.as_str()),
                }
        };

        let mut allowed = false;
        for rule in self.rules.iter().filter(applies) {
            match rule.effect {
                Effect::Deny => return false,
                Effect::Allow => allowed = true,
            }
        }
        allowed
    }

    pub fn roles_of(&self, user_id: &str, scope: Scope, scope_id: Option<&str>) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.kind == RowKind::Role && r.user_id == user_id && r.visible_to(scope, scope_id))
            .map(|r| r.value.clone())
            .collect()
    }

    pub fn holders_of(&self, role: &str, scope: Scope, scope_id: Option<&str>) -> Vec<Subject> {
        self.rows
            .iter()
            .filter(|r| r.kind == RowKind::Role && r.value == role && r.visible_to(scope, scope_id))
            .map(|r| {
                let sid = match r.scope {
                    Scope::Group => Some(r.scope_id.clone()),
                    _ if r.scope_id == WILDCARD => None,
                    _ => Some(r.scope_id.clone()),
                };
                Subject::new(r.user_id.clone(), r.scope, sid)
            })
            .collect()
    }

    pub fn denials_of(&self, user_id: &str, scope: Scope, scope_id: Option<&str>) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.kind == RowKind::Deny && r.user_id == user_id && r.visible_to(scope, scope_id))
            .map(|r| r.value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
        [roles.admin]
        allow = ["*"]

        [roles.member]
        allow = ["maicn:*", "lxns:add"]
        scopes = ["group", "private"]

        [roles.muted]
        deny = ["maicn:b50"]
    "#;

    fn model() -> RoleModel {
        RoleModel::parse(MODEL).unwrap()
    }

    #[test]
    fn object_patterns() {
        assert!(object_matches("*", "maicn:add"));
        assert!(object_matches("maicn:*", "maicn:add"));
        assert!(object_matches("maicn:add", "maicn:add"));
        assert!(!object_matches("maicn:*", "maicnx:add"));
        assert!(!object_matches("maicn:add", "maicn:b50"));
        assert!(!object_matches("mai*", "maicn:add"));
    }

    #[test]
    fn default_deny_without_roles() {
        let set = PolicySet::build(model(), vec![]);
        assert!(!set.evaluate(&Subject::group("1", "100"), "maicn", "add"));
    }

    #[test]
    fn wildcard_group_grant_applies_to_every_group() {
        let set = PolicySet::build(
            model(),
            vec![PolicyRow::role("1", "member", Scope::Group, None)],
        );
        assert!(set.evaluate(&Subject::group("1", "100"), "maicn", "add"));
        assert!(set.evaluate(&Subject::group("1", "200"), "maicn", "update"));
        assert!(!set.evaluate(&Subject::group("1", "200"), "lxns", "create"));
    }

    #[test]
    fn concrete_grant_is_invisible_to_other_groups() {
        let set = PolicySet::build(
            model(),
            vec![PolicyRow::role("1", "member", Scope::Group, Some("100"))],
        );
        assert!(set.evaluate(&Subject::group("1", "100"), "maicn", "add"));
        assert!(!set.evaluate(&Subject::group("1", "200"), "maicn", "add"));
        assert_eq!(set.roles_of("1", Scope::Group, Some("100")), vec!["member"]);
        assert!(set.roles_of("1", Scope::Group, Some("200")).is_empty());
        // 不带 scope_id 的列表查询可见全部
        assert_eq!(set.roles_of("1", Scope::Group, None), vec!["member"]);
    }

    #[test]
    fn no_fallback_from_group_to_global() {
        let set = PolicySet::build(
            model(),
            vec![PolicyRow::role("1", "member", Scope::Private, None)],
        );
        assert!(set.evaluate(&Subject::private("1"), "maicn", "add"));
        assert!(!set.evaluate(&Subject::group("1", "100"), "maicn", "add"));
        assert!(!set.evaluate(&Subject::global("1"), "maicn", "add"));
    }

    #[test]
    fn role_scopes_limit_model_grants() {
        let set = PolicySet::build(
            model(),
            vec![PolicyRow::role("1", "member", Scope::Global, None)],
        );
        // member 的模型授权不含 global
        assert!(!set.evaluate(&Subject::global("1"), "maicn", "add"));
    }

    #[test]
    fn blacklist_beats_role_allow() {
        let set = PolicySet::build(
            model(),
            vec![
                PolicyRow::role("1", "member", Scope::Group, None),
                PolicyRow::deny("1", "maicn:*", Scope::Group, Some("100")),
            ],
        );
        assert!(!set.evaluate(&Subject::group("1", "100"), "maicn", "update"));
        assert!(set.evaluate(&Subject::group("1", "200"), "maicn", "update"));
        assert!(set.evaluate(&Subject::group("1", "100"), "lxns", "add"));
        assert_eq!(set.denials_of("1", Scope::Group, Some("100")), vec!["maicn:*"]);
    }

    #[test]
    fn role_level_deny_wins_over_allow() {
        let set = PolicySet::build(
            model(),
            vec![
                PolicyRow::role("1", "admin", Scope::Group, None),
                PolicyRow::role("1", "muted", Scope::Group, None),
            ],
        );
        assert!(set.evaluate(&Subject::group("1", "5"), "maicn", "add"));
        assert!(!set.evaluate(&Subject::group("1", "5"), "maicn", "b50"));
    }

    #[test]
    fn with_row_adds_and_removes() {
        let base = PolicySet::build(model(), vec![]);
        let row = PolicyRow::role("2", "member", Scope::Group, Some("9"));
        let added = base.with_row(row.clone(), true);
        assert_eq!(added.rows().len(), 1);
        // 重复添加不会产生重复行
        assert_eq!(added.with_row(row.clone(), true).rows().len(), 1);
        assert!(added.with_row(row, false).rows().is_empty());
    }

    #[test]
    fn holders_carry_scope_ids() {
        let set = PolicySet::build(
            model(),
            vec![
                PolicyRow::role("1", "member", Scope::Group, Some("100")),
                PolicyRow::role("2", "member", Scope::Group, None),
                PolicyRow::role("3", "member", Scope::Group, Some("200")),
            ],
        );
        let keys: Vec<String> = set
            .holders_of("member", Scope::Group, Some("100"))
            .iter()
            .map(Subject::key)
            .collect();
        assert_eq!(keys, vec!["1@100", "2@*"]);
    }
}
