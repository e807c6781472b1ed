use anyhow::{Context as _, anyhow};
use remibot::adapters::find_adapter;
use remibot::config::AppConfig;
use remibot::event::{EventType, Runtime};
use remibot::services::Services;
use remibot::{db, error, info, log, plugins, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_init(CONFIG_PATH)
        .await
        .map_err(|e| anyhow!("读取配置文件 {} 失败: {}", CONFIG_PATH, e))?;
    log::set_level(log::Level::parse(&config.log_level));

    // 新插件的默认配置段写回文件
    if config.merge_plugin_defaults(plugins::default_configs()) {
        config
            .save(CONFIG_PATH)
            .await
            .map_err(|e| anyhow!("写回配置文件失败: {}", e))?;
        info!(target: "Config", "已补全插件默认配置");
    }

    let db = db::init(&config.database_url)
        .await
        .context("数据库初始化失败")?;
    let services = Services::build(&config, db)
        .await
        .map_err(|e| anyhow!("服务初始化失败: {}", e))?;

    let bots = config.bots.clone();
    let runtime = Runtime {
        config: Arc::new(RwLock::new(config)),
        config_save_lock: Arc::new(AsyncMutex::new(())),
        config_path: CONFIG_PATH.to_string(),
        services: Arc::new(services),
    };

    let init_ctx = remibot::event::Context::new(&runtime, EventType::Init, Default::default());
    plugins::do_init(init_ctx)
        .await
        .map_err(|e| anyhow!("插件初始化失败: {}", e))?;

    let mut handles = Vec::new();
    for bot in bots.into_iter().filter(|b| b.enabled) {
        let Some(adapter) = find_adapter(&bot.protocol) else {
            error!(target: "System", "未知的适配器协议: {}", bot.protocol);
            continue;
        };
        info!(target: "System", "启动适配器: {}", adapter.protocol);
        handles.push(tokio::spawn((adapter.handler)(bot, runtime.clone())));
    }

    if handles.is_empty() {
        warn!(target: "System", "没有可运行的适配器，退出");
        return Ok(());
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(target: "System", "适配器任务异常退出: {}", e);
        }
    }
    Ok(())
}
