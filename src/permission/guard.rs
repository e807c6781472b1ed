use super::{PermissionManager, Scope, Subject};
use crate::event::{Context, MessageEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationDenied {
    #[error(
        "❌ 权限不足\n用户 {} 在{}没有执行 {}.{} 的权限",
        .subject.user_id,
        .subject.scope_label(),
        .resource,
        .action
    )]
    Permission {
        subject: Subject,
        resource: String,
        action: String,
    },
    #[error("❌ 权限不足\n该操作仅限管理员使用")]
    AdminRequired { subject: Subject },
    #[error("❌ 无法识别消息发送者")]
    NoSender,
}

/// 群消息 → GROUP + 群号；其余 → PRIVATE
pub fn subject_of(msg: &MessageEvent) -> Subject {
    let user_id = msg.user_id().to_string();
    match msg.group_id() {
        Some(gid) if msg.is_group() => Subject::group(user_id, gid.to_string()),
        _ => Subject::private(user_id),
    }
}

pub fn check_permission(
    manager: &PermissionManager,
    subject: Subject,
    resource: &str,
    action: &str,
) -> Result<Subject, AuthorizationDenied> {
    if manager.evaluate(&subject, resource, action) {
        return Ok(subject);
    }
    info!(
        target: "Permission",
        "拒绝 {} -> {}:{}",
        subject.key(),
        resource,
        action
    );
    Err(AuthorizationDenied::Permission {
        subject,
        resource: resource.to_string(),
        action: action.to_string(),
    })
}

pub fn check_admin(
    manager: &PermissionManager,
    subject: Subject,
) -> Result<Subject, AuthorizationDenied> {
    let scope_id = match subject.scope {
        Scope::Group => subject.scope_id(),
        _ => None,
    };
    if manager.is_admin(&subject.user_id, subject.scope, scope_id) {
        Ok(subject)
    } else {
        info!(target: "Permission", "拒绝非管理员 {} 的管理操作", subject.key());
        Err(AuthorizationDenied::AdminRequired { subject })
    }
}

/// 指令前置检查：发送者在当前上下文是否可以执行 resource:action
pub fn require_permission(
    ctx: &Context,
    resource: &str,
    action: &str,
) -> Result<Subject, AuthorizationDenied> {
    let msg = ctx.as_message().ok_or(AuthorizationDenied::NoSender)?;
    check_permission(&ctx.services.permission, subject_of(&msg), resource, action)
}

/// 管理指令前置检查，不经过普通判定
pub fn admin_only(ctx: &Context) -> Result<Subject, AuthorizationDenied> {
    let msg = ctx.as_message().ok_or(AuthorizationDenied::NoSender)?;
    check_admin(&ctx.services.permission, subject_of(&msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::event::tests::parse;
    use crate::event::{EventType, Runtime};
    use crate::permission::store::PolicyStore;
    use crate::services::tests::services_with_model;
    use std::io::Write;
    use std::sync::{Arc, RwLock};
    use tokio::sync::Mutex as AsyncMutex;

    async fn manager() -> (PermissionManager, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            [roles.member]
            allow = ["maicn:*"]
            "#,
        )
        .unwrap();
        let m = PermissionManager::load(PolicyStore::new(db::memory().await), file.path()).await;
        (m, file)
    }

    #[test]
    fn subject_from_events() {
        let group = parse(
            r#"{"post_type":"message","message_type":"group","group_id":77,"user_id":5}"#,
        );
        assert_eq!(subject_of(&MessageEvent(&group)), Subject::group("5", "77"));

        let private = parse(r#"{"post_type":"message","message_type":"private","user_id":5}"#);
        assert_eq!(subject_of(&MessageEvent(&private)), Subject::private("5"));
    }

    #[tokio::test]
    async fn denial_carries_context() {
        let (m, _file) = manager().await;
        let err = check_permission(&m, Subject::group("5", "77"), "maicn", "b50").unwrap_err();
        assert_eq!(
            err,
            AuthorizationDenied::Permission {
                subject: Subject::group("5", "77"),
                resource: "maicn".into(),
                action: "b50".into(),
            }
        );
        assert!(err.to_string().contains("群组 77"));

        m.grant_role("5", "member", Scope::Group, Some("77")).await;
        assert!(check_permission(&m, Subject::group("5", "77"), "maicn", "b50").is_ok());
    }

    #[tokio::test]
    async fn admin_check_ignores_ordinary_rules() {
        let (m, _file) = manager().await;
        m.grant_role("5", "member", Scope::Global, None).await;
        assert!(matches!(
            check_admin(&m, Subject::private("5")),
            Err(AuthorizationDenied::AdminRequired { .. })
        ));

        m.grant_role("5", "admin", Scope::Global, None).await;
        assert!(check_admin(&m, Subject::private("5")).is_ok());
        assert!(check_admin(&m, Subject::group("5", "1")).is_ok());
    }

    async fn context(model: &std::path::Path, event: &str) -> Context {
        let runtime = Runtime {
            config: Arc::new(RwLock::new(AppConfig::default())),
            config_save_lock: Arc::new(AsyncMutex::new(())),
            config_path: String::new(),
            services: Arc::new(services_with_model(model.to_path_buf()).await),
        };
        Context::new(&runtime, EventType::Onebot(parse(event)), Default::default())
    }

    #[tokio::test]
    async fn guards_read_sender_from_context() {
        let (_m, file) = manager().await;
        let ctx = context(
            file.path(),
            r#"{"post_type":"message","message_type":"group","group_id":77,"user_id":5}"#,
        )
        .await;
        assert!(ctx.services.permission.is_ready());

        assert!(matches!(
            require_permission(&ctx, "maicn", "b50"),
            Err(AuthorizationDenied::Permission { .. })
        ));
        assert!(matches!(
            admin_only(&ctx),
            Err(AuthorizationDenied::AdminRequired { .. })
        ));

        let services = &ctx.services.permission;
        services.grant_role("5", "member", Scope::Group, Some("77")).await;
        assert_eq!(
            require_permission(&ctx, "maicn", "b50"),
            Ok(Subject::group("5", "77"))
        );
        services.grant_role("5", "admin", Scope::Global, None).await;
        assert_eq!(admin_only(&ctx), Ok(Subject::group("5", "77")));

        let init = ctx.with_event(EventType::Init);
        assert_eq!(admin_only(&init), Err(AuthorizationDenied::NoSender));
    }
}
