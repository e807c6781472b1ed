//! maimai 国服账号绑定、查分器同步与 B50

use crate::adapters::onebot::{LockedWriter, reply};
use crate::command::{ParsedArgs, match_command};
use crate::config::build_config;
use crate::event::Context;
use crate::maimai::ProviderKind;
use crate::message::Message;
use crate::permission::require_permission;
use crate::plugins::{PluginError, get_config};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use toml::Value;

mod account;
mod b50_image;
mod messages;
mod score;

use b50_image::B50Style;

pub const USAGE: &str = "🎵 maimai
/maicn add <二维码> [档案名] 添加国服账号
/maicn bind <水鱼|落雪> <绑定名> 为当前档案关联查分器
/maicn current [档案名] 查看或切换当前档案
/maicn update [水鱼|落雪] 同步机台成绩到查分器
/maicn b50 [水鱼|落雪] 生成 B50 成绩图
/lx add <好友码> [绑定名] 添加落雪账号
/lx create 为绑定的好友码创建落雪档案
/df add <用户名> <密码> [绑定名] 添加水鱼账号 (建议私聊)";

#[derive(Serialize, Deserialize, Clone)]
struct MaicnConfig {
    /// 封面目录，文件名为 `{歌曲编号}.png`
    #[serde(default = "default_cover_dir")]
    cover_dir: String,
    /// 留空使用系统 sans-serif
    #[serde(default)]
    font_family: String,
    /// `/maicn b50` 不带参数时使用的查分器
    #[serde(default = "default_b50_source")]
    default_b50_source: String,
}

fn default_cover_dir() -> String {
    "data/maicn/covers".to_string()
}

fn default_b50_source() -> String {
    "落雪".to_string()
}

impl Default for MaicnConfig {
    fn default() -> Self {
        Self {
            cover_dir: default_cover_dir(),
            font_family: String::new(),
            default_b50_source: default_b50_source(),
        }
    }
}

pub fn default_config() -> Value {
    build_config(MaicnConfig::default())
}

/// 指令组：(命令名, 权限资源)
const GROUPS: [(&str, &str); 5] = [
    ("maicn", "maicn"),
    ("lx", "lxns"),
    ("lxns", "lxns"),
    ("df", "divingfish"),
    ("divingfish", "divingfish"),
];

/// 子命令是否属于该资源
fn is_known(resource: &str, action: &str) -> bool {
    match resource {
        "maicn" => matches!(action, "add" | "bind" | "current" | "update" | "b50"),
        "lxns" => matches!(action, "add" | "create"),
        "divingfish" => action == "add",
        _ => false,
    }
}

fn find_command(ctx: &Context) -> Option<(&'static str, ParsedArgs)> {
    GROUPS
        .iter()
        .find_map(|(name, resource)| match_command(ctx, name).map(|m| (*resource, m.parsed())))
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let Some((resource, args)) = find_command(&ctx) else {
            return Ok(Some(ctx));
        };
        let action = args.arg(0).unwrap_or_default().to_string();

        if !is_known(resource, &action) {
            reply(&ctx, writer, USAGE).await?;
            return Ok(None);
        }

        if let Err(denied) = require_permission(&ctx, resource, &action) {
            reply(&ctx, writer, denied.to_string()).await?;
            return Ok(None);
        }

        let Some((qq, nickname)) = ctx
            .as_message()
            .map(|m| (m.user_id().to_string(), m.sender_name().to_string()))
        else {
            return Ok(None);
        };
        let config: MaicnConfig = get_config(&ctx, "maicn").unwrap_or_default();
        let binds = &ctx.services.binds;

        debug!(target: "Maicn", "{}({}) 执行 {}:{}", nickname, qq, resource, action);

        let response: Message = match (resource, action.as_str()) {
            ("maicn", "add") => account::add_arcade(binds, &qq, &args).await.into(),
            ("maicn", "bind") => account::bind_source(binds, &qq, &args).await.into(),
            ("maicn", "current") => account::current(binds, &qq, &args).await.into(),
            ("maicn", "update") => score::update(binds, &qq, &args).await.into(),
            ("maicn", "b50") => {
                let default_source = config
                    .default_b50_source
                    .parse()
                    .unwrap_or(ProviderKind::Lxns);
                let style = B50Style {
                    font_family: config.font_family.clone(),
                    cover_dir: config.cover_dir.clone().into(),
                };
                score::b50(binds, &qq, &args, default_source, style).await
            }
            ("lxns", "add") => account::add_lxns(binds, &qq, &args).await.into(),
            ("lxns", "create") => account::create_lxns(binds, &qq).await.into(),
            ("divingfish", "add") => account::add_divingfish(binds, &qq, &args).await.into(),
            _ => USAGE.into(),
        };

        reply(&ctx, writer, response).await?;
        Ok(None)
    })
}
