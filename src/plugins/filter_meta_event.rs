//! 心跳、生命周期事件以及机器人自己发出的消息不进入后续插件

use crate::adapters::onebot::LockedWriter;
use crate::event::Context;
use crate::plugins::{PluginError, build_config};
use futures_util::future::BoxFuture;
use serde::Serialize;
use toml::Value;

const IGNORED: [&str; 2] = ["meta_event", "message_sent"];

#[derive(Serialize)]
struct FilterConfig {}

pub fn default_config() -> Value {
    build_config(FilterConfig {})
}

fn is_ignored(post_type: Option<&str>) -> bool {
    post_type.is_some_and(|t| IGNORED.contains(&t))
}

pub fn handle(
    ctx: Context,
    _writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        if is_ignored(ctx.post_type()) {
            return Ok(None);
        }
        Ok(Some(ctx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_noise_is_dropped() {
        assert!(is_ignored(Some("meta_event")));
        assert!(is_ignored(Some("message_sent")));
        assert!(!is_ignored(Some("message")));
        assert!(!is_ignored(Some("notice")));
        // BeforeSend / Init 没有 post_type
        assert!(!is_ignored(None));
    }
}
