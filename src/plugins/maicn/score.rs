//! 成绩类指令：同步到查分器、生成 B50

use super::account::{identity, preview_or_fallback};
use super::b50_image::{self, B50Style};
use super::messages::{self as msg, describe_error};
use crate::command::ParsedArgs;
use crate::maimai::{BindError, BindResolver, ProviderKind};
use crate::message::Message;

/// 解析可选的查分器参数，`None` 表示全部
fn source_arg(args: &ParsedArgs, index: usize) -> Result<Option<ProviderKind>, String> {
    match args.arg(index) {
        None => Ok(None),
        Some(s) => s
            .parse::<ProviderKind>()
            .map(Some)
            .map_err(|_| msg::UNSUPPORTED_SOURCE.to_string()),
    }
}

/// `/maicn update [查分器]`
pub async fn update(binds: &BindResolver, qq: &str, args: &ParsedArgs) -> String {
    let kinds: Vec<ProviderKind> = match source_arg(args, 1) {
        Ok(k) => k.into_iter().collect(),
        Err(reply) => return reply,
    };
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply,
    };

    match binds.reconcile_scores(uuid, &kinds).await {
        Ok(report) => {
            info!(
                target: "Maicn",
                "QQ {} 同步成绩: {:?}",
                qq,
                report.outcomes
            );
            msg::format_update_report(&report)
        }
        Err(e) => {
            warn!(target: "Maicn", "同步成绩失败: {}", e);
            describe_error(&e, msg::UPDATE_FAILED)
        }
    }
}

/// `/maicn b50 [查分器]`，未指定时使用配置的默认查分器
pub async fn b50(
    binds: &BindResolver,
    qq: &str,
    args: &ParsedArgs,
    default_source: ProviderKind,
    style: B50Style,
) -> Message {
    let kind = match source_arg(args, 1) {
        Ok(k) => k.unwrap_or(default_source),
        Err(reply) => return reply.into(),
    };
    let uuid = match identity(binds, qq).await {
        Ok(u) => u,
        Err(reply) => return reply.into(),
    };

    let profile = match binds.get_current_profile(uuid).await {
        Ok(Some(p)) => p,
        Ok(None) => return msg::HINT_NO_MAIMAI_BIND.into(),
        Err(e) => return describe_error(&e, msg::SERVICE_UNAVAILABLE).into(),
    };

    let best = match binds.best50(&profile, kind).await {
        Ok(best) => best,
        Err(e @ BindError::Remote(_)) => {
            warn!(target: "Maicn", "获取{} B50 失败: {}", kind, e);
            return msg::SCORE_FETCH_FAILED.into();
        }
        Err(e) => return describe_error(&e, msg::SCORE_FETCH_FAILED).into(),
    };
    let player = preview_or_fallback(binds, &profile).await;

    let rendered =
        tokio::task::spawn_blocking(move || b50_image::render(&player.user_name, &best, &style))
            .await;
    match rendered {
        Ok(Ok(image)) => Message::new().image(image),
        Ok(Err(e)) => {
            error!(target: "Maicn", "绘制 B50 失败: {}", e);
            msg::B50_FAILED.into()
        }
        Err(e) => {
            error!(target: "Maicn", "B50 绘制任务异常: {}", e);
            msg::B50_FAILED.into()
        }
    }
}
