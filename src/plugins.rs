use crate::adapters::onebot::{LockedWriter, send_frame_raw};
use crate::event::{Context, EventType};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::OnceLock;
use toml::Value;

pub use crate::config::build_config;

pub mod filter_meta_event;
pub mod help;
pub mod maicn;
pub mod permission;

pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

pub type PluginHandler =
    fn(Context, LockedWriter) -> BoxFuture<'static, Result<Option<Context>, PluginError>>;

pub type PluginInitHandler = fn(Context) -> BoxFuture<'static, Result<(), PluginError>>;

pub struct Plugin {
    pub name: &'static str,
    pub handler: PluginHandler,
    pub on_init: Option<PluginInitHandler>,
    pub default_config: fn() -> Value,
}

static PLUGINS: OnceLock<Vec<Plugin>> = OnceLock::new();

/// 获取全局插件列表 (按执行顺序)
pub fn get_plugins() -> &'static [Plugin] {
    PLUGINS.get_or_init(|| {
        vec![
            Plugin {
                name: "filter_meta_event",
                handler: filter_meta_event::handle,
                on_init: None,
                default_config: filter_meta_event::default_config,
            },
            Plugin {
                name: "help",
                handler: help::handle,
                on_init: None,
                default_config: help::default_config,
            },
            Plugin {
                name: "permission",
                handler: permission::handle,
                on_init: Some(permission::init),
                default_config: permission::default_config,
            },
            Plugin {
                name: "maicn",
                handler: maicn::handle,
                on_init: None,
                default_config: maicn::default_config,
            },
        ]
    })
}

/// 每个插件的默认配置段，用于补全 config.toml
pub fn default_configs() -> impl Iterator<Item = (&'static str, Value)> {
    get_plugins().iter().map(|p| (p.name, (p.default_config)()))
}

fn enabled_plugins(ctx: &Context) -> HashSet<String> {
    let Ok(guard) = ctx.config.read() else {
        return HashSet::new();
    };
    guard
        .plugins
        .iter()
        .filter(|(_, v)| v.get("enabled").and_then(|x| x.as_bool()).unwrap_or(false))
        .map(|(k, _)| k.clone())
        .collect()
}

/// 执行所有插件的初始化逻辑
pub async fn do_init(ctx: Context) -> Result<(), PluginError> {
    let plugins = get_plugins();
    let enabled = enabled_plugins(&ctx);

    info!(
        target: "System",
        "正在加载插件系统 (已启用 {}/{})",
        enabled.len(),
        plugins.len()
    );

    for plugin in plugins {
        if !enabled.contains(plugin.name) {
            continue;
        }

        if let Some(init_fn) = plugin.on_init {
            match init_fn(ctx.with_event(EventType::Init)).await {
                Ok(_) => info!(target: "Plugin", "✅ [{}] 就绪 (Init Success)", plugin.name),
                Err(e) => error!(target: "Plugin", "❌ [{}] 初始化失败: {}", plugin.name, e),
            }
        } else {
            info!(target: "Plugin", "✅ [{}] 就绪", plugin.name);
        }
    }
    Ok(())
}

/// 运行插件流水线。任一插件返回 None 即终止；BeforeSend 事件走完后发出。
pub async fn run(mut ctx: Context, writer: LockedWriter) -> Result<(), PluginError> {
    let enabled = enabled_plugins(&ctx);

    for plugin in get_plugins() {
        if !enabled.contains(plugin.name) {
            continue;
        }

        match (plugin.handler)(ctx, writer.clone()).await? {
            Some(next_ctx) => ctx = next_ctx,
            None => return Ok(()),
        }
    }

    if let EventType::BeforeSend(packet) = ctx.event {
        let json_str = simd_json::to_string(&packet)?;
        send_frame_raw(writer, json_str).await?;
    }

    Ok(())
}

pub fn get_config<T>(ctx: &Context, plugin_name: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let guard = ctx.config.read().ok()?;
    guard
        .plugins
        .get(plugin_name)
        .and_then(|v| T::deserialize(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_runs_first_and_names_are_unique() {
        let names: Vec<&str> = get_plugins().iter().map(|p| p.name).collect();
        assert_eq!(names, ["filter_meta_event", "help", "permission", "maicn"]);

        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn every_default_section_is_enabled() {
        for (name, section) in default_configs() {
            assert_eq!(
                section.get("enabled").and_then(Value::as_bool),
                Some(true),
                "{name}"
            );
        }
    }
}
