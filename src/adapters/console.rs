use crate::adapters::onebot::{LockedWriter, process_frame};
use crate::config::BotConfig;
use crate::event::{BotStatus, LoginUser, Runtime};
use crate::message::Message;
use futures_util::Sink;
use futures_util::future::BoxFuture;
use serde::Serialize;
use simd_json::base::{ValueAsArray, ValueAsScalar};
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

const CONSOLE_USER: i64 = 1;

#[derive(Serialize)]
struct MockSender {
    user_id: i64,
    nickname: String,
    card: String,
}

#[derive(Serialize)]
struct MockMessageEvent {
    post_type: &'static str,
    message_type: &'static str,
    time: i64,
    self_id: i64,
    sub_type: &'static str,
    user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<i64>,
    message_id: i64,
    font: i32,
    sender: MockSender,
    raw_message: String,
    message: Message,
}

/// 拆出行首的 `>群号` 前缀，没有前缀时视为私聊
fn split_group_prefix(line: &str) -> (Option<i64>, &str) {
    if let Some(rest) = line.strip_prefix('>') {
        let (gid, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Ok(gid) = gid.parse::<i64>() {
            return (Some(gid), text.trim_start());
        }
    }
    (None, line)
}

fn mock_event(line: &str, timestamp: i64) -> MockMessageEvent {
    let (group_id, text) = split_group_prefix(line);
    MockMessageEvent {
        post_type: "message",
        message_type: if group_id.is_some() { "group" } else { "private" },
        time: timestamp,
        self_id: 0,
        sub_type: if group_id.is_some() { "normal" } else { "friend" },
        user_id: CONSOLE_USER,
        group_id,
        message_id: timestamp,
        font: 0,
        sender: MockSender {
            user_id: CONSOLE_USER,
            nickname: "ConsoleUser".to_string(),
            card: String::new(),
        },
        raw_message: text.to_string(),
        message: Message::new().text(text),
    }
}

/// 控制台适配器入口
pub fn entry(_bot_config: BotConfig, runtime: Runtime) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        info!(target: "Console", "已启动控制台模式。请输入指令 (例如: /help)");
        info!(
            target: "Console",
            "模拟环境: User ID: {} | 私聊；以 `>群号 ` 开头模拟群消息",
            CONSOLE_USER
        );

        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        let writer: LockedWriter = Arc::new(AsyncMutex::new(Box::new(ConsoleSink)));
        let bot_status = RwLock::new(BotStatus {
            adapter: "console".to_string(),
            platform: "console".to_string(),
            login_user: LoginUser {
                id: "0".to_string(),
                name: Some("ConsoleBot".to_string()),
            },
        });

        while let Ok(Some(line)) = reader.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = mock_event(line, chrono::Local::now().timestamp());
            let mut json_bytes = match simd_json::to_vec(&event) {
                Ok(b) => b,
                Err(e) => {
                    warn!(target: "Console", "构造模拟消息失败: {}", e);
                    continue;
                }
            };

            if let Err(e) = process_frame(&mut json_bytes, writer.clone(), &runtime, &bot_status).await {
                warn!(target: "Console", "处理消息时出错: {}", e);
            }
        }
    })
}

/// 把 Bot 发出的动作打印到终端
struct ConsoleSink;

fn render_message(msg: &simd_json::OwnedValue) -> String {
    if let Some(s) = msg.as_str() {
        return s.to_string();
    }
    let Some(segments) = msg.as_array() else {
        return format!("{:?}", msg);
    };
    segments
        .iter()
        .map(|seg| match seg.get_str("type").unwrap_or("") {
            "text" => seg
                .get("data")
                .and_then(|d| d.get_str("text"))
                .unwrap_or("")
                .to_string(),
            "reply" => String::new(),
            "image" => "[图片]".to_string(),
            other => format!("[{}]", other),
        })
        .collect()
}

impl Sink<WsMessage> for ConsoleSink {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        if let WsMessage::Text(text) = item {
            let mut data = text.as_bytes().to_vec();
            match simd_json::to_owned_value(&mut data) {
                Ok(val) => {
                    if val.get_str("action") == Some("send_msg")
                        && let Some(msg) = val.get("params").and_then(|p| p.get("message"))
                    {
                        println!("\x1b[36m[Bot Reply] > \x1b[0m{}", render_message(msg));
                    } else {
                        println!(
                            "\x1b[90m[API Call] > {}\x1b[0m",
                            val.get_str("action").unwrap_or("unknown")
                        );
                    }
                }
                Err(_) => println!("\x1b[36m[Bot Raw] > \x1b[0m{}", text.as_str()),
            }
        }
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
