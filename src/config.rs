use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use toml::Value;

pub type ConfigError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 全局指令前缀（支持多个，如 ["/", "#"]）
    #[serde(default = "default_prefix")]
    pub command_prefix: Vec<String>,

    // 日志级别: error / warn / info / debug
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // SQLite 数据库地址（权限策略表存放于此）
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // Bot 连接配置
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,

    // 外部服务配置 (Remi / 水鱼 / 落雪)
    #[serde(default)]
    pub services: ServiceConfig,

    // 权限系统配置
    #[serde(default)]
    pub permission: PermissionConfig,

    // 插件配置
    #[serde(flatten)]
    pub plugins: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_remi_base_url")]
    pub remi_base_url: String,

    #[serde(default = "default_divingfish_base_url")]
    pub divingfish_base_url: String,
    #[serde(default)]
    pub divingfish_developer_token: String,

    #[serde(default = "default_lxns_base_url")]
    pub lxns_base_url: String,
    #[serde(default)]
    pub lxns_developer_token: String,

    // 所有外部 HTTP 请求的超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            remi_base_url: default_remi_base_url(),
            divingfish_base_url: default_divingfish_base_url(),
            divingfish_developer_token: String::new(),
            lxns_base_url: default_lxns_base_url(),
            lxns_developer_token: String::new(),
            request_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PermissionConfig {
    // 角色模型文件（角色 -> 允许的 resource:action）
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
        }
    }
}

impl AppConfig {
    /// 读取配置文件；文件不存在时写入默认配置
    pub async fn load_or_init(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            let config = AppConfig::default();
            config.save(path).await?;
            info!(target: "Config", "已生成默认配置文件: {}", path);
            return Ok(config);
        }

        let content = fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        if config.bots.iter().all(|b| !b.enabled) {
            warn!(target: "Config", "没有启用任何 Bot 连接，请检查 {}", path);
        }
        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).await?;
        Ok(())
    }

    /// 补全缺失的插件配置段，返回是否有改动
    pub fn merge_plugin_defaults<'a, I>(&mut self, defaults: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut changed = false;
        for (name, value) in defaults {
            if !self.plugins.contains_key(name) {
                self.plugins.insert(name.to_string(), value);
                changed = true;
            }
        }
        changed
    }
}

fn default_prefix() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    // mode=rwc 允许 读/写/创建
    "sqlite:data/bot.db?mode=rwc".to_string()
}

fn default_remi_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_divingfish_base_url() -> String {
    "https://www.diving-fish.com/api/maimaidxprober".to_string()
}

fn default_lxns_base_url() -> String {
    "https://maimai.lxns.net".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_model_path() -> String {
    "data/permission/model.toml".to_string()
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        // 控制台适配器：保持简洁，仅需启用
        BotConfig {
            enabled: true,
            protocol: "console".to_string(),
            url: None,
            access_token: None,
        },
        // OneBot 适配器：生成配置占位符，默认禁用以防误连
        BotConfig {
            enabled: false,
            protocol: "onebot".to_string(),
            url: Some("ws://127.0.0.1:3001".to_string()),
            access_token: Some("YOUR_TOKEN_HERE".to_string()),
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    // 是否启用此 Bot
    #[serde(default = "default_true")]
    pub enabled: bool,

    // 协议类型 (例如 "onebot")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    "onebot".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            log_level: default_log_level(),
            database_url: default_database_url(),
            bots: default_bots(),
            services: ServiceConfig::default(),
            permission: PermissionConfig::default(),
            plugins: HashMap::new(),
        }
    }
}

/// 辅助函数：构建默认配置 Value，并确保包含 enabled 字段
pub fn build_config<T: Serialize>(data: T) -> Value {
    let mut val = Value::try_from(data).unwrap_or(Value::Table(Default::default()));
    if let Value::Table(ref mut map) = val
        && !map.contains_key("enabled")
    {
        map.insert("enabled".to_string(), Value::Boolean(true));
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_gets_defaults() {
        let cfg: AppConfig = toml::from_str(
            r##"
            command_prefix = ["#"]

            [services]
            remi_base_url = "http://remi.local"

            [maicn]
            enabled = true
            "##,
        )
        .unwrap();

        assert_eq!(cfg.command_prefix, vec!["#".to_string()]);
        assert_eq!(cfg.services.remi_base_url, "http://remi.local");
        assert_eq!(cfg.services.request_timeout_secs, 15);
        assert_eq!(cfg.permission.model_path, "data/permission/model.toml");
        assert!(cfg.plugins.contains_key("maicn"));
        assert!(!cfg.plugins.contains_key("services"));
    }

    #[test]
    fn build_config_inserts_enabled() {
        #[derive(Serialize)]
        struct Empty {
            font_family: String,
        }
        let v = build_config(Empty {
            font_family: "sans-serif".into(),
        });
        assert_eq!(v.get("enabled").and_then(|x| x.as_bool()), Some(true));
    }

    #[test]
    fn merge_only_fills_missing_sections() {
        let mut cfg = AppConfig::default();
        cfg.plugins
            .insert("help".into(), build_config(toml::value::Table::new()));
        let changed = cfg.merge_plugin_defaults([
            ("help", Value::Boolean(false)),
            ("maicn", build_config(toml::value::Table::new())),
        ]);
        assert!(changed);
        assert!(cfg.plugins["help"].is_table());
        assert!(cfg.plugins.contains_key("maicn"));
    }
}
