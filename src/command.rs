use crate::event::Context;
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsArray, ValueObjectAccessAsScalar};
use std::collections::HashMap;

pub struct CommandMatch {
    /// 匹配后的参数列表（剩余的消息段）
    pub args: Vec<OwnedValue>,
    /// 被过滤掉的引用回复 ID
    pub reply_id: Option<String>,
    /// 被过滤掉的 AT 用户 ID 列表
    pub at_ids: Vec<String>,
}

impl CommandMatch {
    /// 文本参数 (按空白切分)
    pub fn words(&self) -> Vec<String> {
        extract_args(&self.args)
    }

    /// 文本参数 + `--key value` 选项
    pub fn parsed(&self) -> ParsedArgs {
        ParsedArgs::parse(&self.words())
    }
}

pub fn get_prefixes(ctx: &Context) -> Vec<String> {
    ctx.config
        .read()
        .map(|c| c.command_prefix.clone())
        .unwrap_or_default()
}

fn segment_id(data: &OwnedValue, key: &str) -> Option<String> {
    data.get_str(key)
        .map(String::from)
        .or_else(|| data.get_i64(key).map(|v| v.to_string()))
        .or_else(|| data.get_u64(key).map(|v| v.to_string()))
}

/// 解析指令：自动过滤头部的 Reply/At/空白，匹配 [Prefix][Command]，返回参数及引用信息
pub fn match_command(ctx: &Context, command_name: &str) -> Option<CommandMatch> {
    let prefixes = get_prefixes(ctx);
    let msg_arr = ctx.as_message()?.0.get_array("message")?;

    let mut reply_id = None;
    let mut at_ids = Vec::new();

    for (i, segment) in msg_arr.iter().enumerate() {
        let type_ = segment.get_str("type")?;
        let data = segment.get("data")?;

        match type_ {
            "reply" => {
                if reply_id.is_none() {
                    reply_id = segment_id(data, "id");
                }
            }
            "at" => {
                if let Some(qq) = segment_id(data, "qq") {
                    at_ids.push(qq);
                }
            }
            "text" => {
                let raw_text = data.get_str("text").unwrap_or("");
                let trimmed_start = raw_text.trim_start();
                if trimmed_start.is_empty() {
                    continue;
                }

                for prefix in &prefixes {
                    let target = format!("{}{}", prefix, command_name);
                    let Some(rest_of_text) = trimmed_start.strip_prefix(&target) else {
                        continue;
                    };
                    // "/lx" 不应命中 "/lxns"
                    if rest_of_text
                        .chars()
                        .next()
                        .is_some_and(|c| !c.is_whitespace())
                    {
                        continue;
                    }

                    let mut args = Vec::new();
                    let args_text = rest_of_text.trim_start();
                    if !args_text.is_empty() {
                        let mut new_seg = segment.clone();
                        new_seg["data"]["text"] = OwnedValue::from(args_text);
                        args.push(new_seg);
                    }

                    for seg in msg_arr.iter().skip(i + 1) {
                        args.push(seg.clone());
                    }

                    return Some(CommandMatch {
                        reply_id,
                        at_ids,
                        args,
                    });
                }
                // 第一个有效文本未命中，视为匹配失败
                return None;
            }
            _ => return None,
        }
    }

    None
}

/// 将 match_command 解析出的参数（消息段列表）提取为纯文本参数列表
pub fn extract_args(args: &[OwnedValue]) -> Vec<String> {
    let mut full_text = String::new();
    for arg in args {
        if arg.get_str("type") == Some("text")
            && let Some(text) = arg.get("data").and_then(|d| d.get_str("text"))
        {
            full_text.push_str(text);
            full_text.push(' ');
        }
    }
    full_text
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// 位置参数与 `--name value` 选项
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    pub options: HashMap<String, String>,
}

impl ParsedArgs {
    pub fn parse(words: &[String]) -> Self {
        let mut parsed = ParsedArgs::default();
        let mut iter = words.iter().peekable();

        while let Some(word) = iter.next() {
            let Some(name) = word.strip_prefix("--") else {
                parsed.positional.push(word.clone());
                continue;
            };

            if let Some((key, value)) = name.split_once('=') {
                parsed.options.insert(key.to_string(), value.to_string());
                continue;
            }

            let value = match iter.peek() {
                Some(next) if !next.starts_with("--") => iter.next().cloned().unwrap_or_default(),
                _ => String::new(),
            };
            parsed.options.insert(name.to_string(), value);
        }
        parsed
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// 支持 `--scope-id` / `--scope_id` 两种写法
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .or_else(|| self.options.get(&name.replace('-', "_")))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::parse;
    use simd_json::base::ValueAsArray;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn options_and_positionals() {
        let p = ParsedArgs::parse(&words("add_role 123 member --scope group --scope-id 456"));
        assert_eq!(p.positional, vec!["add_role", "123", "member"]);
        assert_eq!(p.option("scope"), Some("group"));
        assert_eq!(p.option("scope-id"), Some("456"));
        assert_eq!(p.arg(1), Some("123"));
        assert_eq!(p.arg(3), None);
    }

    #[test]
    fn option_forms() {
        let p = ParsedArgs::parse(&words("--scope=private --flag --scope_id 9 x"));
        assert_eq!(p.option("scope"), Some("private"));
        assert_eq!(p.option("flag"), None);
        assert!(p.options.contains_key("flag"));
        assert_eq!(p.option("scope-id"), Some("9"));
        assert_eq!(p.positional, vec!["x"]);
    }

    #[test]
    fn extract_args_joins_text_segments() {
        let ev = parse(
            r#"[{"type":"text","data":{"text":"bind 水鱼"}},
                {"type":"at","data":{"qq":"1"}},
                {"type":"text","data":{"text":"main"}}]"#,
        );
        let args = ev.as_array().unwrap().clone();
        assert_eq!(extract_args(&args), vec!["bind", "水鱼", "main"]);
    }
}
