//! 账号与档案类指令：添加绑定、切换档案、落雪建档

use super::messages::{self as msg, describe_error};
use crate::command::ParsedArgs;
use crate::maimai::score::PlayerPreview;
use crate::maimai::{
    BindError, BindResolver, BindType, DivingFishCredential, LxnsCreateOutcome, Profile,
    ProfileBindUpdate, ProviderKind, RemoteError,
};
use uuid::Uuid;

/// QQ → Remi UUID，失败时直接给出回复文本
pub(super) async fn identity(binds: &BindResolver, qq: &str) -> Result<Uuid, String> {
    binds.resolve_or_create_identity(qq).await.map_err(|e| {
        error!(target: "Maicn", "获取 QQ {} 的用户 UUID 失败: {}", qq, e);
        msg::SERVICE_UNAVAILABLE.to_string()
    })
}

/// 机台概要拿不到时用绑定名代替，不影响档案展示
pub(super) async fn preview_or_fallback(binds: &BindResolver, profile: &Profile) -> PlayerPreview {
    match binds.player_preview(profile).await {
        Ok(preview) => preview,
        Err(e) => {
            warn!(target: "Maicn", "获取玩家概要失败: {}", e);
            PlayerPreview {
                user_name: profile.primary.bind_name.clone(),
                player_rating: 0,
            }
        }
    }
}

async fn render_profile(binds: &BindResolver, title: &str, profile: &Profile) -> String {
    let preview = preview_or_fallback(binds, profile).await;
    msg::format_profile(title, &preview, &profile.others)
}

/// `/maicn add <二维码> [名称]`
pub async fn add_arcade(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let Some(qr) = args.arg(1) else {
        return "❌ 用法: /maicn add <二维码内容> [档案名称]".to_string();
    };
    let name = args.arg(2);
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    let uid = match binds.uid_from_qr(qr).await {
        Ok(uid) => uid,
        Err(BindError::Remote(RemoteError::Transient(e))) => {
            warn!(target: "Maicn", "解析二维码失败: {}", e);
            return msg::ADD_FAILED.to_string();
        }
        Err(_) => return msg::QR_INVALID.to_string(),
    };

    match binds
        .add_bind(uuid, BindType::MaimaiCn, &uid.to_string(), name)
        .await
    {
        Ok(_) => {
            info!(target: "Maicn", "QQ {} 添加了国服账号", qq);
            msg::MAIMAI_ADDED.to_string()
        }
        Err(e) => {
            warn!(target: "Maicn", "添加国服账号失败: {}", e);
            msg::ADD_FAILED.to_string()
        }
    }
}

/// `/maicn bind <查分器> <绑定名>`：把当前档案关联到某个查分器绑定
pub async fn bind_source(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let (Some(source), Some(bind_name)) = (args.arg(1), args.arg(2)) else {
        return "❌ 用法: /maicn bind <水鱼|落雪> <绑定名>".to_string();
    };
    let Ok(kind) = source.parse::<ProviderKind>() else {
        return msg::UNSUPPORTED_SOURCE.to_string();
    };
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    let update = ProfileBindUpdate::for_provider(kind, bind_name);
    match binds.update_current_profile_binds(uuid, &update).await {
        Ok(Some(profile)) => render_profile(binds, "✅ 绑定更新成功", &profile).await,
        Ok(None) => msg::UPDATE_FAILED.to_string(),
        Err(e) => {
            warn!(target: "Maicn", "更新档案绑定失败: {}", e);
            describe_error(&e, msg::UPDATE_FAILED)
        }
    }
}

/// `/maicn current [档案名]`：不带参数查看，带参数切换
pub async fn current(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    let (result, title) = match args.arg(1) {
        Some(name) => (
            binds
                .switch_current_profile(uuid, name)
                .await
                .and_then(|p| p.ok_or_else(|| BindError::ProfileNotFound(name.to_string()))),
            "✅ 档案切换成功",
        ),
        None => (
            binds
                .get_current_profile(uuid)
                .await
                .and_then(|p| p.ok_or(BindError::NoProfile)),
            "📋 当前maimai档案",
        ),
    };

    match result {
        Ok(profile) => render_profile(binds, title, &profile).await,
        Err(e) => describe_error(&e, msg::SERVICE_UNAVAILABLE),
    }
}

/// `/lx add <好友码> [名称]`
pub async fn add_lxns(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let Some(friend_code) = args.arg(1) else {
        return "❌ 用法: /lx add <好友码> [绑定名]".to_string();
    };
    if friend_code.parse::<u64>().is_err() {
        return "❌ 好友码应为纯数字".to_string();
    }
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    match binds
        .add_bind(uuid, BindType::Luoxue, friend_code, args.arg(2))
        .await
    {
        Ok(_) => msg::LXNS_ADDED.to_string(),
        Err(e) => {
            warn!(target: "Maicn", "添加落雪绑定失败: {}", e);
            msg::ADD_FAILED.to_string()
        }
    }
}

/// `/lx create`：用当前档案的玩家名在落雪建档
pub async fn create_lxns(binds: &BindResolver, qq: &str) -> String {
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    match binds.create_lxns_profile(uuid).await {
        Ok(LxnsCreateOutcome::AlreadyExists(name)) => msg::lxns_profile_exists(&name),
        Ok(LxnsCreateOutcome::Created(player)) => msg::lxns_created(&player),
        Err(e) => {
            warn!(target: "Maicn", "落雪建档失败: {}", e);
            describe_error(&e, msg::CREATE_LXNS_FAILED)
        }
    }
}

/// `/df add <用户名> <密码> [名称]`
pub async fn add_divingfish(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let (Some(username), Some(password)) = (args.arg(1), args.arg(2)) else {
        return "❌ 用法: /df add <用户名> <密码> [绑定名]".to_string();
    };
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    let credential = DivingFishCredential::new(username, password);
    match binds
        .add_divingfish_bind(uuid, &credential, args.arg(3))
        .await
    {
        Ok(_) => {
            info!(target: "Maicn", "QQ {} 添加了水鱼账号 {}", qq, username);
            msg::DIVINGFISH_ADDED.to_string()
        }
        Err(e) => {
            warn!(target: "Maicn", "添加水鱼绑定失败: {}", e);
            msg::ADD_FAILED.to_string()
        }
    }
}
