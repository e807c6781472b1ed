//! OneBot v11 消息链。机器人只发三种段：文本、图片 (B50) 和引用回复。

use serde::Serialize;
use simd_json::base::ValueAsScalar;
use simd_json::owned::{Object, Value};

#[derive(Debug, Serialize, Clone)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Object,
}

impl Segment {
    /// text / image / reply 的 data 都只有一个字段
    fn single(kind: &'static str, key: &str, value: String) -> Self {
        let mut data = Object::new();
        data.insert(key.into(), Value::from(value));
        Self { kind, data }
    }

    fn as_text(&self) -> Option<&str> {
        match self.kind {
            "text" => self.data.get("text").and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone, Default)]
#[serde(transparent)]
pub struct Message {
    segments: Vec<Segment>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.push(Segment::single("text", "text", text.into()))
    }

    /// `file` 可以是 URL、本地路径或 `base64://...`
    pub fn image(self, file: impl Into<String>) -> Self {
        self.push(Segment::single("image", "file", file.into()))
    }

    /// 引用回复段，OneBot 要求放在消息最前面
    pub fn reply(self, message_id: impl ToString) -> Self {
        self.push(Segment::single("reply", "id", message_id.to_string()))
    }

    pub fn extend(mut self, other: Message) -> Self {
        self.segments.extend(other.segments);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// 所有文本段拼接，控制台回显和测试断言用
    pub fn plain_text(&self) -> String {
        self.segments.iter().filter_map(Segment::as_text).collect()
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::new().text(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::new().text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_segment_leads_the_chain() {
        let msg = Message::new()
            .reply(12)
            .extend(Message::from("ok").image("base64://AAAA"));
        let kinds: Vec<_> = msg.segments().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec!["reply", "text", "image"]);
        assert_eq!(msg.plain_text(), "ok");

        let json = simd_json::to_string(&msg).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains(r#""type":"reply""#));
        assert!(json.contains(r#""id":"12""#));
    }

    #[test]
    fn images_have_no_plain_text() {
        let msg = Message::new().image("base64://AAAA");
        assert!(!msg.is_empty());
        assert_eq!(msg.plain_text(), "");
    }
}
