use crate::config::AppConfig;
use crate::services::Services;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;

/// OneBot 推送的原始 JSON
pub type Event = OwnedValue;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginUser {
    pub id: String,
    pub name: Option<String>,
}

/// 当前连接的机器人账号
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotStatus {
    pub adapter: String,
    pub platform: String,
    pub login_user: LoginUser,
}

/// 进程级共享状态：启动时构建一次，由适配器注入每个 Context
#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<RwLock<AppConfig>>,
    pub config_save_lock: Arc<AsyncMutex<()>>,
    pub config_path: String,
    pub services: Arc<Services>,
}

/// 插件链上传递的上下文。event 按值移动，其余字段共享。
#[derive(Clone)]
pub struct Context {
    pub event: EventType,
    pub config: Arc<RwLock<AppConfig>>,
    pub config_save_lock: Arc<AsyncMutex<()>>,
    pub config_path: String,
    pub services: Arc<Services>,
    pub bot: BotStatus,
}

impl Context {
    pub fn new(runtime: &Runtime, event: EventType, bot: BotStatus) -> Self {
        Self {
            event,
            config: runtime.config.clone(),
            config_save_lock: runtime.config_save_lock.clone(),
            config_path: runtime.config_path.clone(),
            services: runtime.services.clone(),
            bot,
        }
    }

    pub fn with_event(&self, event: EventType) -> Self {
        Self {
            event,
            config: self.config.clone(),
            config_save_lock: self.config_save_lock.clone(),
            config_path: self.config_path.clone(),
            services: self.services.clone(),
            bot: self.bot.clone(),
        }
    }

    pub fn post_type(&self) -> Option<&str> {
        match &self.event {
            EventType::Onebot(event) => event.get_str("post_type"),
            _ => None,
        }
    }

    /// post_type 为 message 的 OneBot 事件
    pub fn as_message(&self) -> Option<MessageEvent<'_>> {
        match &self.event {
            EventType::Onebot(event) if event.get_str("post_type") == Some("message") => {
                Some(MessageEvent(event))
            }
            _ => None,
        }
    }
}

/// QQ 号、群号在不同实现里可能被编码成有符号或无符号整数
fn id_field(event: &Event, key: &str) -> Option<i64> {
    event
        .get_i64(key)
        .or_else(|| event.get_u64(key).and_then(|v| i64::try_from(v).ok()))
}

pub struct MessageEvent<'a>(pub &'a Event);

impl<'a> MessageEvent<'a> {
    pub fn group_id(&self) -> Option<i64> {
        id_field(self.0, "group_id")
    }

    pub fn user_id(&self) -> i64 {
        id_field(self.0, "user_id").unwrap_or(0)
    }

    pub fn message_id(&self) -> i64 {
        id_field(self.0, "message_id").unwrap_or(0)
    }

    pub fn is_group(&self) -> bool {
        self.0.get_str("message_type") == Some("group")
    }

    /// 群名片优先，其次昵称
    pub fn sender_name(&self) -> &'a str {
        let sender = self.0.get("sender");
        let field = |key: &str| sender.and_then(|s| s.get_str(key)).filter(|s| !s.is_empty());
        field("card").or_else(|| field("nickname")).unwrap_or("未知用户")
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    Onebot(Event),
    /// 即将发出的动作，插件可以改写或拦截
    BeforeSend(SendPacket),
    /// 插件 on_init 阶段
    Init,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SendPacket {
    pub action: String,
    pub params: OwnedValue,
    /// 触发这次发送的事件，不随动作发出
    #[serde(skip)]
    pub original_event: Option<Event>,
}
