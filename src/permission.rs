//! 作用域化的角色权限 (RBAC) 与黑名单
//!
//! 一次权限判定由 `(subject, resource, action)` 三元组构成，
//! 对象字符串为 `resource:action`。黑名单 (deny) 永远优先于角色授予的 allow，
//! 普通判定只在请求所在的作用域内进行，不会回落到全局。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod guard;
pub mod manager;
pub mod model;
pub mod store;

pub use guard::{AuthorizationDenied, admin_only, require_permission, subject_of};
pub use manager::PermissionManager;

/// 通配 scope_id，匹配同作用域下的任意群
pub const WILDCARD: &str = "*";

/// 保留的管理员角色名
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Group,
    Private,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Global, Scope::Group, Scope::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Group => "group",
            Scope::Private => "private",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scope::Global => "全局",
            Scope::Group => "群组",
            Scope::Private => "私聊",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("无效的权限范围 `{0}`，支持的范围: global, group, private")]
pub struct InvalidScope(pub String);

impl FromStr for Scope {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "group" => Ok(Scope::Group),
            "private" => Ok(Scope::Private),
            other => Err(InvalidScope(other.to_string())),
        }
    }
}

/// 权限主体：某个用户在某个作用域 (及可选的群号) 下
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub user_id: String,
    pub scope: Scope,
    pub scope_id: Option<String>,
}

impl Subject {
    pub fn new(user_id: impl Into<String>, scope: Scope, scope_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scope,
            scope_id,
        }
    }

    pub fn global(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Scope::Global, None)
    }

    pub fn private(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Scope::Private, None)
    }

    pub fn group(user_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self::new(user_id, Scope::Group, Some(group_id.into()))
    }

    /// 主体标识：群作用域为 `user@group`，其余为 `user`
    pub fn key(&self) -> String {
        match (&self.scope, &self.scope_id) {
            (Scope::Group, Some(gid)) => format!("{}@{}", self.user_id, gid),
            _ => self.user_id.clone(),
        }
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    /// 面向用户的作用域描述，例如 `群组 123456`
    pub fn scope_label(&self) -> String {
        scope_label(self.scope, self.scope_id())
    }
}

pub fn scope_label(scope: Scope, scope_id: Option<&str>) -> String {
    match scope_id {
        Some(id) => format!("{} {}", scope.label(), id),
        None => scope.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_keys() {
        assert_eq!(Subject::group("42", "1000").key(), "42@1000");
        assert_eq!(Subject::private("42").key(), "42");
        assert_eq!(Subject::global("42").key(), "42");
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("Group".parse::<Scope>(), Ok(Scope::Group));
        assert_eq!(" private ".parse::<Scope>(), Ok(Scope::Private));
        assert!("guild".parse::<Scope>().is_err());
    }

    #[test]
    fn scope_labels() {
        assert_eq!(Subject::group("1", "99").scope_label(), "群组 99");
        assert_eq!(Subject::global("1").scope_label(), "全局");
    }
}
