//! 权限管理指令 `/permission ...`

use crate::adapters::onebot::{LockedWriter, reply};
use crate::command::match_command;
use crate::config::build_config;
use crate::event::Context;
use crate::permission::subject_of;
use crate::plugins::PluginError;
use futures_util::future::BoxFuture;
use serde::Serialize;
use toml::Value;

mod handlers;

pub use handlers::execute;

pub const USAGE: &str = "🔐 权限管理 (管理员)
/permission add_role <用户> <角色> [--scope global|group|private] [--scope-id 群号]
/permission remove_role <用户> <角色> [--scope ...] [--scope-id ...]
/permission list_roles <用户> [--scope ...] [--scope-id ...]
/permission list_users <角色> [--scope ...] [--scope-id ...]
/permission add_blacklist <用户> <资源> [动作] [--scope ...] [--scope-id ...]
/permission remove_blacklist <用户> <资源> [动作] [--scope ...] [--scope-id ...]
/permission list_blacklist <用户> [--scope ...] [--scope-id ...]
/permission reload
/permission check | info";

#[derive(Serialize)]
struct PermissionPluginConfig {}

pub fn default_config() -> Value {
    build_config(PermissionPluginConfig {})
}

pub fn init(ctx: Context) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        if !ctx.services.permission.is_ready() {
            warn!(
                target: "Permission",
                "权限策略未加载，当前所有指令放行；修复模型文件后执行 /permission reload"
            );
        }
        Ok(())
    })
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let Some(cmd) = match_command(&ctx, "permission") else {
            return Ok(Some(ctx));
        };
        let Some(msg) = ctx.as_message() else {
            return Ok(Some(ctx));
        };

        let sender = subject_of(&msg);
        let text = execute(&ctx.services.permission, sender, &cmd.parsed()).await;
        reply(&ctx, writer, text).await?;
        Ok(None)
    })
}
