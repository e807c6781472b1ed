//! OneBot v11 正向 WebSocket 适配器

use crate::config::BotConfig;
use crate::event::{BotStatus, Context, Event, EventType, LoginUser, Runtime, SendPacket};
use crate::message::Message;
use crate::plugins;
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, StreamExt};
use http::HeaderValue;
use serde::Serialize;
use simd_json::derived::ValueObjectAccessAsScalar;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};

pub type BotError = Box<dyn std::error::Error + Send + Sync>;

pub type TraitSink =
    Box<dyn Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin>;
pub type LockedWriter = Arc<AsyncMutex<TraitSink>>;

const RECONNECT_SECS: u64 = 3;

/// 消息发往哪里。群号优先，0 视为缺省。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Group(i64),
    Private(i64),
}

impl Target {
    pub fn pick(group_id: Option<i64>, user_id: Option<i64>) -> Option<Self> {
        match (group_id.filter(|&g| g != 0), user_id.filter(|&u| u != 0)) {
            (Some(gid), _) => Some(Target::Group(gid)),
            (None, Some(uid)) => Some(Target::Private(uid)),
            (None, None) => None,
        }
    }
}

#[derive(Serialize)]
struct SendMsgParams<T> {
    message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    message: T,
}

impl<T> SendMsgParams<T> {
    fn new(target: Target, message: T) -> Self {
        match target {
            Target::Group(gid) => Self {
                message_type: "group",
                group_id: Some(gid),
                user_id: None,
                message,
            },
            Target::Private(uid) => Self {
                message_type: "private",
                group_id: None,
                user_id: Some(uid),
                message,
            },
        }
    }
}

pub fn entry(bot_config: BotConfig, runtime: Runtime) -> BoxFuture<'static, ()> {
    Box::pin(async move { run_bot_loop(bot_config, runtime).await })
}

/// 断线后固定间隔重连，永不返回
pub async fn run_bot_loop(bot_config: BotConfig, runtime: Runtime) {
    let label = bot_config.url.clone().unwrap_or_else(|| "未配置".to_string());
    loop {
        match connect_and_listen(&bot_config, &runtime).await {
            Ok(()) => warn!(target: "Bot", "[{}] 连接断开，{} 秒后重连", label, RECONNECT_SECS),
            Err(e) => error!(
                target: "Bot",
                "[{}] 连接失败: {}，{} 秒后重试",
                label,
                e,
                RECONNECT_SECS
            ),
        }
        tokio::time::sleep(Duration::from_secs(RECONNECT_SECS)).await;
    }
}

async fn connect_and_listen(config: &BotConfig, runtime: &Runtime) -> Result<(), BotError> {
    let url = config.url.as_deref().ok_or("OneBot URL 未配置")?;
    let mut request = url.into_client_request()?;
    if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let (ws_stream, _) = connect_async(request).await?;
    info!(target: "Bot", "[{}] 已连接", url);

    let (write_half, mut read_half) = ws_stream.split();
    let writer: LockedWriter = Arc::new(AsyncMutex::new(Box::new(write_half)));
    let status = Arc::new(RwLock::new(BotStatus {
        adapter: "onebot".to_string(),
        platform: "qq".to_string(),
        login_user: LoginUser {
            id: "0".to_string(),
            name: None,
        },
    }));

    while let Some(frame) = read_half.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                let mut data = text.as_bytes().to_vec();
                let (writer, runtime, status) = (writer.clone(), runtime.clone(), status.clone());
                // 每帧一个任务，慢请求 (查分器、绘图) 不阻塞后续事件
                tokio::spawn(async move {
                    if let Err(e) = process_frame(&mut data, writer, &runtime, &status).await {
                        error!(target: "Bot", "事件处理出错: {}", e);
                    }
                });
            }
            Ok(WsMessage::Close(_)) => return Ok(()),
            Err(e) => return Err(Box::new(e)),
            _ => {}
        }
    }
    Ok(())
}

/// 登录号取自事件的 self_id，首次出现或变化时记录
fn observe_self_id(event: &Event, status: &RwLock<BotStatus>) -> Result<BotStatus, BotError> {
    let self_id = event
        .get_i64("self_id")
        .or_else(|| event.get_u64("self_id").and_then(|v| i64::try_from(v).ok()))
        .filter(|&id| id != 0);

    let mut guard = status.write().map_err(|_| "Bot 状态锁已损坏")?;
    if let Some(id) = self_id.map(|id| id.to_string())
        && guard.login_user.id != id
    {
        info!(target: "Bot", "登录账号: {}", id);
        guard.login_user.id = id;
    }
    Ok(guard.clone())
}

/// 解析一帧并送入插件流水线。非 JSON 帧和 API 响应帧直接忽略。
pub async fn process_frame(
    data: &mut [u8],
    writer: LockedWriter,
    runtime: &Runtime,
    status: &RwLock<BotStatus>,
) -> Result<(), BotError> {
    let Ok(event) = simd_json::to_owned_value(data) else {
        return Ok(());
    };
    if event.get_str("post_type").is_none() {
        return Ok(());
    }

    let bot = observe_self_id(&event, status)?;
    plugins::run(Context::new(runtime, EventType::Onebot(event), bot), writer).await?;
    Ok(())
}

/// 组装 send_msg 动作，先经过 BeforeSend 流水线再发出
pub async fn send_msg<M: Serialize>(
    ctx: &Context,
    writer: LockedWriter,
    target: Target,
    message: M,
) -> Result<(), BotError> {
    let mut bytes = simd_json::to_vec(&SendMsgParams::new(target, message))?;
    let params = simd_json::to_owned_value(&mut bytes)?;

    let original_event = match &ctx.event {
        EventType::Onebot(ev) => Some(ev.clone()),
        EventType::BeforeSend(pkt) => pkt.original_event.clone(),
        EventType::Init => None,
    };
    let packet = SendPacket {
        action: "send_msg".to_string(),
        params,
        original_event,
    };

    plugins::run(ctx.with_event(EventType::BeforeSend(packet)), writer).await?;
    Ok(())
}

/// 回复当前消息：群聊引用原消息，私聊直接发送
pub async fn reply(
    ctx: &Context,
    writer: LockedWriter,
    message: impl Into<Message>,
) -> Result<(), BotError> {
    let Some(msg) = ctx.as_message() else {
        return Ok(());
    };
    let Some(target) = Target::pick(msg.group_id(), Some(msg.user_id())) else {
        return Ok(());
    };

    let mut message: Message = message.into();
    if matches!(target, Target::Group(_)) && msg.message_id() != 0 {
        message = Message::new().reply(msg.message_id()).extend(message);
    }
    send_msg(ctx, writer, target, message).await
}

pub async fn send_frame_raw(writer: LockedWriter, json_str: String) -> Result<(), BotError> {
    writer.lock().await.send(WsMessage::Text(json_str.into())).await?;
    Ok(())
}
