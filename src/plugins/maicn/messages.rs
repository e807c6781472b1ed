//! 面向用户的回复文本。只在这里把 `BindError` 之类的结果翻译成聊天消息。

use crate::maimai::backend::ProviderPlayer;
use crate::maimai::{Bind, BindError, BindType, DivingFishCredential, ProviderKind};
use crate::maimai::{ProviderOutcome, SourceUpdateReport};
use crate::maimai::score::PlayerPreview;

pub const MAIMAI_ADDED: &str = "✅ maimai账号添加成功";
pub const LXNS_ADDED: &str = "✅ 落雪查分器添加成功";
pub const DIVINGFISH_ADDED: &str = "✅ 水鱼查分器添加成功";

pub const ADD_FAILED: &str = "❌ 添加失败，请稍后重试";
pub const UPDATE_FAILED: &str = "❌ 更新失败，请稍后重试";
pub const SWITCH_FAILED: &str = "❌ 切换失败，请检查档案名称";
pub const SERVICE_UNAVAILABLE: &str = "❌ 服务暂时不可用，请稍后重试";
pub const QR_INVALID: &str = "❌ 二维码无效或已过期，请重新获取";
pub const UNSUPPORTED_SOURCE: &str = "❌ 不支持的数据源";
pub const CREATE_LXNS_FAILED: &str = "❌ 创建落雪档案失败，请稍后重试";
pub const NO_UPDATE_SOURCE: &str = "❌ 没有可更新的数据源，请检查您的绑定信息";
pub const SCORE_FETCH_FAILED: &str = "❌ 无法获取您的成绩数据，请检查绑定信息或稍后重试";
pub const B50_FAILED: &str = "❌ 生成B50图片失败，请稍后重试";

pub const HINT_NO_MAIMAI_BIND: &str = "💡 您还没有绑定maimai账号，请先使用 /maicn add 绑定";
pub const HINT_NO_BIND: &str = "💡 您还没有绑定任何查分器，请先绑定查分器";

const RULE: &str = "━━━━━━━━━━━━━━━━";

/// 好友码只露出首尾各三位
pub fn mask_friend_code(code: &str) -> String {
    let chars: Vec<char> = code.trim().chars().collect();
    if chars.len() > 6 {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        "***".to_string()
    }
}

fn bind_line(bind: &Bind) -> String {
    let (icon, type_name, detail) = match &bind.bind_type {
        BindType::Luoxue => (
            "❄️",
            "落雪查分器".to_string(),
            format!("好友码: {}", mask_friend_code(&bind.bind_content)),
        ),
        BindType::DivingFish => (
            "🐟",
            "水鱼查分器".to_string(),
            match DivingFishCredential::parse(&bind.bind_content) {
                Ok(c) => format!("用户名: {}", c.username),
                Err(_) => "绑定信息解析失败".to_string(),
            },
        ),
        other => ("🔗", other.to_string(), "已绑定".to_string()),
    };
    let name = if bind.bind_name.is_empty() {
        "默认"
    } else {
        &bind.bind_name
    };
    let current = if bind.is_default { " (当前)" } else { "" };
    format!("  {} {} - {}{}\n     {}", icon, type_name, name, current, detail)
}

/// 档案关联的查分器列表，密码永远不出现在输出里
pub fn format_binds(binds: &[Bind]) -> String {
    if binds.is_empty() {
        return "暂无绑定信息".to_string();
    }
    binds.iter().map(bind_line).collect::<Vec<_>>().join("\n")
}

/// 档案卡片。`title` 为首行，例如 "📋 当前maimai档案"
pub fn format_profile(title: &str, preview: &PlayerPreview, others: &[Bind]) -> String {
    format!(
        "{title}\n{RULE}\n🎮 用户名: {}\n⭐ Rating: {}\n{RULE}\n🔗 绑定信息:\n{}",
        preview.user_name,
        preview.player_rating,
        format_binds(others)
    )
}

pub fn lxns_profile_exists(name: &str) -> String {
    format!("💡 该好友码已存在落雪档案：{}，无需重复创建", name)
}

pub fn lxns_created(player: &ProviderPlayer) -> String {
    let detail = serde_json::to_string_pretty(&player.raw).unwrap_or_else(|_| player.name.clone());
    format!("✅ 创建落雪档案成功\n{}", detail)
}

fn not_bound_hint(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::Lxns => "💡 当前档案未绑定落雪查分器，请先使用 /lx add 绑定".to_string(),
        ProviderKind::DivingFish => {
            "💡 您还没有绑定水鱼查分器，请先使用 /df add 绑定".to_string()
        }
    }
}

fn malformed_hint(kind: ProviderKind) -> String {
    format!("❌ {}绑定数据格式错误或不完整，请重新绑定", kind)
}

/// `BindError` → 回复文本。`fallback` 用于远端暂时性错误。
pub fn describe_error(err: &BindError, fallback: &str) -> String {
    match err {
        BindError::NoProfile | BindError::InvalidArcadeUid(_) => HINT_NO_MAIMAI_BIND.to_string(),
        BindError::ProfileNotFound(_) => SWITCH_FAILED.to_string(),
        BindError::NoProviderBound => HINT_NO_BIND.to_string(),
        BindError::NotBound(kind) => not_bound_hint(*kind),
        BindError::MalformedCredential(kind) => malformed_hint(*kind),
        BindError::ProviderUnavailable(kind) => format!("❌ {}查分器暂未开放", kind),
        BindError::Remote(_) => fallback.to_string(),
    }
}

fn outcome_line(kind: ProviderKind, outcome: &ProviderOutcome) -> Option<String> {
    match outcome {
        ProviderOutcome::Updated => None,
        ProviderOutcome::NotBound => None,
        ProviderOutcome::MalformedCredential => Some(malformed_hint(kind)),
        ProviderOutcome::RemoteNotFound => Some(match kind {
            ProviderKind::Lxns => {
                "❌ 您绑定的好友码在落雪查分器中没有找到对应档案，可使用 /lx create 创建".to_string()
            }
            ProviderKind::DivingFish => "❌ 水鱼查分器中没有找到您的账号".to_string(),
        }),
        ProviderOutcome::Failed(_) => Some(format!("❌ {}数据更新失败，请稍后重试", kind)),
    }
}

/// 成绩同步结果：成功的查分器汇总为一行，失败的逐条说明
pub fn format_update_report(report: &SourceUpdateReport) -> String {
    let updated: Vec<&str> = report.updated().map(|k| k.label()).collect();
    let problems: Vec<String> = report
        .outcomes
        .iter()
        .filter_map(|(kind, outcome)| outcome_line(*kind, outcome))
        .collect();

    if updated.is_empty() && problems.is_empty() {
        return NO_UPDATE_SOURCE.to_string();
    }

    let mut lines = Vec::new();
    if !updated.is_empty() {
        lines.push(format!("✅ 已成功更新{}的数据", updated.join(",")));
    }
    lines.extend(problems);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maimai::RemoteError;

    fn bind(t: BindType, content: &str, name: &str) -> Bind {
        Bind {
            bind_type: t,
            bind_content: content.to_string(),
            bind_name: name.to_string(),
            is_default: true,
        }
    }

    #[test]
    fn friend_codes_are_masked() {
        assert_eq!(mask_friend_code("123456789"), "123***789");
        assert_eq!(mask_friend_code("12345"), "***");
    }

    #[test]
    fn passwords_never_leak() {
        let df = bind(
            BindType::DivingFish,
            r#"{"username":"alice","password":"hunter2"}"#,
            "main",
        );
        let lx = bind(BindType::Luoxue, "123456789", "lx");
        let text = format_binds(&[df, lx]);
        assert!(text.contains("用户名: alice"));
        assert!(text.contains("好友码: 123***789"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("123456789"));
        assert!(text.contains("main (当前)"));
    }

    #[test]
    fn profile_card() {
        let preview = PlayerPreview {
            user_name: "ＭＡＩ".into(),
            player_rating: 15000,
        };
        let text = format_profile("📋 当前maimai档案", &preview, &[]);
        assert!(text.starts_with("📋 当前maimai档案\n"));
        assert!(text.contains("⭐ Rating: 15000"));
        assert!(text.ends_with("暂无绑定信息"));
    }

    #[test]
    fn partial_update_report() {
        let report = SourceUpdateReport {
            outcomes: vec![
                (ProviderKind::DivingFish, ProviderOutcome::Updated),
                (ProviderKind::Lxns, ProviderOutcome::RemoteNotFound),
            ],
        };
        let text = format_update_report(&report);
        assert!(text.starts_with("✅ 已成功更新水鱼的数据"));
        assert!(text.contains("/lx create"));

        let nothing = SourceUpdateReport {
            outcomes: vec![
                (ProviderKind::DivingFish, ProviderOutcome::NotBound),
                (ProviderKind::Lxns, ProviderOutcome::NotBound),
            ],
        };
        assert_eq!(format_update_report(&nothing), NO_UPDATE_SOURCE);
    }

    #[test]
    fn errors_map_to_hints() {
        assert_eq!(
            describe_error(&BindError::NoProfile, UPDATE_FAILED),
            HINT_NO_MAIMAI_BIND
        );
        assert_eq!(
            describe_error(&RemoteError::transient("timeout").into(), UPDATE_FAILED),
            UPDATE_FAILED
        );
        assert!(describe_error(&BindError::NotBound(ProviderKind::Lxns), "").contains("/lx add"));
    }
}
