use crate::adapters::onebot::{LockedWriter, reply};
use crate::command::match_command;
use crate::config::build_config;
use crate::event::Context;
use crate::plugins::{PluginError, get_config, maicn, permission};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use toml::Value;

const ALIASES: [&str; 4] = ["help", "帮助", "帮助文档", "怎么用"];

#[derive(Serialize, Deserialize, Default)]
struct HelpConfig {
    /// 追加在帮助末尾的自定义说明
    #[serde(default)]
    footer: String,
}

pub fn default_config() -> Value {
    build_config(HelpConfig::default())
}

fn help_text(footer: &str) -> String {
    let mut text = format!("📖 使用帮助\n\n{}\n\n{}", maicn::USAGE, permission::USAGE);
    if !footer.is_empty() {
        text.push_str("\n\n");
        text.push_str(footer);
    }
    text
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        if !ALIASES.iter().any(|name| match_command(&ctx, name).is_some()) {
            return Ok(Some(ctx));
        }

        let config: HelpConfig = get_config(&ctx, "help").unwrap_or_default();
        reply(&ctx, writer, help_text(&config.footer)).await?;
        Ok(None)
    })
}
