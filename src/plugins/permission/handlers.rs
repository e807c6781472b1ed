use crate::command::ParsedArgs;
use crate::permission::guard::check_admin;
use crate::permission::{PermissionManager, Scope, Subject, WILDCARD, scope_label};

const INFO_TEXT: &str = "🔐 权限管理系统信息

📋 支持的权限范围：
  • global - 全局权限
  • group - 群组权限
  • private - 私聊权限

👑 内置角色：
  • admin - 管理员（拥有所有权限）
  • guest - 访客（拥有所有功能权限）

🚫 黑名单功能：
  • 支持为特定用户禁用特定功能
  • 黑名单优先于角色权限
  • 可按范围（全局/群组/私聊）设置

💡 使用提示：
  • 普通权限只在当前范围内判定，不回落到全局
  • 群组授权可用 --scope-id * 覆盖所有群
  • 管理员可以管理所有权限";

/// 指令目标作用域。`--scope group` 缺省群号时取当前群。
struct Target {
    scope: Scope,
    scope_id: Option<String>,
}

impl Target {
    fn resolve(args: &ParsedArgs, sender: &Subject) -> Result<Self, String> {
        let scope = match args.option("scope") {
            Some(s) => s.parse::<Scope>().map_err(|e| format!("❌ {}", e))?,
            None => Scope::Global,
        };
        let mut scope_id = args.option("scope-id").map(str::to_string);

        if scope == Scope::Group && scope_id.is_none() {
            match (&sender.scope, sender.scope_id()) {
                (Scope::Group, Some(gid)) => scope_id = Some(gid.to_string()),
                _ => return Err("❌ 群组权限需要指定群组ID".to_string()),
            }
        }
        Ok(Self { scope, scope_id })
    }

    fn id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    fn label(&self) -> String {
        scope_label(self.scope, self.id())
    }
}

fn bullet_list<I: IntoIterator<Item = String>>(items: I) -> String {
    items
        .into_iter()
        .map(|i| format!("  • {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn missing(usage: &str) -> String {
    format!("❌ 参数不足\n用法: /permission {}", usage)
}

/// 执行一条 `/permission` 子指令并返回回复文本
pub async fn execute(manager: &PermissionManager, sender: Subject, args: &ParsedArgs) -> String {
    let sub = args.arg(0).unwrap_or("info");

    match sub {
        "info" => return INFO_TEXT.to_string(),
        "check" => return check_self(manager, &sender),
        _ => {}
    }

    if let Err(denied) = check_admin(manager, sender.clone()) {
        return denied.to_string();
    }

    match sub {
        "add_role" | "remove_role" => role_change(manager, &sender, args, sub == "add_role").await,
        "list_roles" => list_roles(manager, &sender, args),
        "list_users" => list_users(manager, &sender, args),
        "add_blacklist" | "remove_blacklist" => {
            blacklist_change(manager, &sender, args, sub == "add_blacklist").await
        }
        "list_blacklist" => list_blacklist(manager, &sender, args),
        "reload" => {
            if manager.reload().await {
                "✅ 权限策略重新加载成功".to_string()
            } else {
                "❌ 权限策略重新加载失败".to_string()
            }
        }
        other => format!("❌ 未知的子命令: {}\n发送 /permission info 查看说明", other),
    }
}

async fn role_change(
    manager: &PermissionManager,
    sender: &Subject,
    args: &ParsedArgs,
    grant: bool,
) -> String {
    let (Some(user), Some(role)) = (args.arg(1), args.arg(2)) else {
        return missing(if grant {
            "add_role <用户> <角色>"
        } else {
            "remove_role <用户> <角色>"
        });
    };
    let target = match Target::resolve(args, sender) {
        Ok(t) => t,
        Err(msg) => return msg,
    };

    let (ok, verb) = if grant {
        (manager.grant_role(user, role, target.scope, target.id()).await, "添加")
    } else {
        (manager.revoke_role(user, role, target.scope, target.id()).await, "移除")
    };

    if ok {
        info!(
            target: "Permission",
            "{} {}角色 {} -> {} ({})",
            sender.user_id,
            verb,
            role,
            user,
            target.label()
        );
        format!("✅ 成功为用户 {} 在{} {}角色 {}", user, target.label(), verb, role)
    } else {
        format!("❌ 为用户 {} {}角色 {} 失败", user, verb, role)
    }
}

fn list_roles(manager: &PermissionManager, sender: &Subject, args: &ParsedArgs) -> String {
    let Some(user) = args.arg(1) else {
        return missing("list_roles <用户>");
    };
    let target = match Target::resolve(args, sender) {
        Ok(t) => t,
        Err(msg) => return msg,
    };

    let roles = manager.list_roles(user, target.scope, target.id());
    if roles.is_empty() {
        format!("👤 用户 {} 在{} 没有任何角色", user, target.label())
    } else {
        format!(
            "👤 用户 {} 在{} 的角色：\n{}",
            user,
            target.label(),
            bullet_list(roles)
        )
    }
}

fn list_users(manager: &PermissionManager, sender: &Subject, args: &ParsedArgs) -> String {
    let Some(role) = args.arg(1) else {
        return missing("list_users <角色>");
    };
    let target = match Target::resolve(args, sender) {
        Ok(t) => t,
        Err(msg) => return msg,
    };

    let holders = manager.list_subjects_for_role(role, target.scope, target.id());
    if holders.is_empty() {
        return format!("👥 {} 没有用户拥有角色 {}", target.label(), role);
    }

    // 查询具体群时通配授予不再重复标注
    let lines = holders.iter().map(|s| match s.scope_id() {
        Some(gid) if gid != WILDCARD || target.id().is_none() => {
            format!("{} ({})", s.user_id, s.scope_label())
        }
        _ => s.user_id.clone(),
    });
    format!(
        "👥 {} 拥有角色 {} 的用户：\n{}",
        target.label(),
        role,
        bullet_list(lines)
    )
}

async fn blacklist_change(
    manager: &PermissionManager,
    sender: &Subject,
    args: &ParsedArgs,
    add: bool,
) -> String {
    let (Some(user), Some(resource)) = (args.arg(1), args.arg(2)) else {
        return missing(if add {
            "add_blacklist <用户> <资源> [动作]"
        } else {
            "remove_blacklist <用户> <资源> [动作]"
        });
    };
    let action = args.arg(3).unwrap_or(WILDCARD);
    let target = match Target::resolve(args, sender) {
        Ok(t) => t,
        Err(msg) => return msg,
    };

    let (ok, verb) = if add {
        (
            manager
                .add_blacklist(user, resource, action, target.scope, target.id())
                .await,
            "添加",
        )
    } else {
        (
            manager
                .remove_blacklist(user, resource, action, target.scope, target.id())
                .await,
            "移除",
        )
    };

    if ok {
        format!(
            "✅ 成功为用户 {} 在{} {}黑名单: {}:{}",
            user,
            target.label(),
            verb,
            resource,
            action
        )
    } else {
        format!("❌ 为用户 {} {}黑名单失败", user, verb)
    }
}

fn list_blacklist(manager: &PermissionManager, sender: &Subject, args: &ParsedArgs) -> String {
    let Some(user) = args.arg(1) else {
        return missing("list_blacklist <用户>");
    };
    let target = match Target::resolve(args, sender) {
        Ok(t) => t,
        Err(msg) => return msg,
    };

    let items = manager.list_blacklist(user, target.scope, target.id());
    if items.is_empty() {
        format!("🚫 用户 {} 在{} 没有任何黑名单", user, target.label())
    } else {
        format!(
            "🚫 用户 {} 在{} 的黑名单：\n{}",
            user,
            target.label(),
            bullet_list(items)
        )
    }
}

/// 任何人都可以查看自己的角色
fn check_self(manager: &PermissionManager, sender: &Subject) -> String {
    let mut parts = vec!["👤 您的权限信息：".to_string()];

    let global = manager.list_roles(&sender.user_id, Scope::Global, None);
    if !global.is_empty() {
        parts.push(format!("\n🌐 全局角色：\n{}", bullet_list(global)));
    }

    let private = manager.list_roles(&sender.user_id, Scope::Private, None);
    if !private.is_empty() {
        parts.push(format!("\n💬 私聊角色：\n{}", bullet_list(private)));
    }

    if let (Scope::Group, Some(gid)) = (sender.scope, sender.scope_id()) {
        let group = manager.list_roles(&sender.user_id, Scope::Group, Some(gid));
        if !group.is_empty() {
            parts.push(format!("\n👥 群组 {} 角色：\n{}", gid, bullet_list(group)));
        }
    }

    if parts.len() == 1 {
        parts.push("\n❌ 您没有任何角色".to_string());
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::permission::store::PolicyStore;
    use std::io::Write;

    async fn manager() -> (PermissionManager, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            [roles.admin]
            allow = ["*"]
            [roles.member]
            allow = ["maicn:*"]
            "#,
        )
        .unwrap();
        let store = PolicyStore::new(db::memory().await);
        let m = PermissionManager::load(store, file.path()).await;
        assert!(m.is_ready());
        (m, file)
    }

    fn args(line: &str) -> ParsedArgs {
        let words: Vec<String> = line.split_whitespace().map(String::from).collect();
        ParsedArgs::parse(&words)
    }

    #[tokio::test]
    async fn non_admin_is_refused() {
        let (m, _f) = manager().await;
        let reply = execute(&m, Subject::private("2"), &args("add_role 3 member")).await;
        assert!(reply.contains("仅限管理员"));
        assert!(m.list_roles("3", Scope::Global, None).is_empty());

        // info / check 不需要管理员
        let info = execute(&m, Subject::private("2"), &args("info")).await;
        assert!(info.contains("权限管理系统信息"));
        let check = execute(&m, Subject::private("2"), &args("check")).await;
        assert!(check.contains("您没有任何角色"));
    }

    #[tokio::test]
    async fn group_scope_defaults_to_current_group() {
        let (m, _f) = manager().await;
        assert!(m.grant_role("1", "admin", Scope::Global, None).await);

        let admin_in_group = Subject::group("1", "500");
        let reply = execute(&m, admin_in_group, &args("add_role 3 member --scope group")).await;
        assert_eq!(reply, "✅ 成功为用户 3 在群组 500 添加角色 member");
        assert!(m.evaluate(&Subject::group("3", "500"), "maicn", "b50"));

        let reply = execute(&m, Subject::private("1"), &args("add_role 3 member --scope group")).await;
        assert_eq!(reply, "❌ 群组权限需要指定群组ID");

        let reply = execute(&m, Subject::private("1"), &args("add_role 3 member --scope guild")).await;
        assert!(reply.contains("无效的权限范围"));
    }

    #[tokio::test]
    async fn blacklist_round() {
        let (m, _f) = manager().await;
        assert!(m.grant_role("1", "admin", Scope::Global, None).await);
        let admin = Subject::private("1");

        let reply = execute(
            &m,
            admin.clone(),
            &args("add_blacklist 3 maicn --scope group --scope-id 500"),
        )
        .await;
        assert_eq!(reply, "✅ 成功为用户 3 在群组 500 添加黑名单: maicn:*");

        let listed = execute(
            &m,
            admin.clone(),
            &args("list_blacklist 3 --scope group --scope-id 500"),
        )
        .await;
        assert!(listed.contains("  • maicn:*"));

        let reply = execute(
            &m,
            admin,
            &args("remove_blacklist 3 maicn --scope group --scope-id 500"),
        )
        .await;
        assert!(reply.starts_with("✅"));
    }

    #[tokio::test]
    async fn list_and_reload() {
        let (m, _f) = manager().await;
        assert!(m.grant_role("1", "admin", Scope::Global, None).await);
        let admin = Subject::private("1");

        let roles = execute(&m, admin.clone(), &args("list_roles 1")).await;
        assert_eq!(roles, "👤 用户 1 在全局 的角色：\n  • admin");

        let users = execute(&m, admin.clone(), &args("list_users admin")).await;
        assert!(users.contains("  • 1"));

        assert_eq!(
            execute(&m, admin.clone(), &args("reload")).await,
            "✅ 权限策略重新加载成功"
        );
        assert!(execute(&m, admin.clone(), &args("add_role 3")).await.contains("参数不足"));
        assert!(execute(&m, admin, &args("frobnicate")).await.contains("未知的子命令"));
    }
}
