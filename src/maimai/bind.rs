use super::error::BindError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 绑定类型。未知类型原样保留，不丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BindType {
    Qq,
    DivingFish,
    Luoxue,
    MaimaiCn,
    Other(String),
}

impl BindType {
    pub fn as_str(&self) -> &str {
        match self {
            BindType::Qq => "qq",
            BindType::DivingFish => "divingfish",
            BindType::Luoxue => "luoxue",
            BindType::MaimaiCn => "maimai_cn",
            BindType::Other(s) => s,
        }
    }
}

impl From<String> for BindType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "qq" => BindType::Qq,
            "divingfish" => BindType::DivingFish,
            "luoxue" => BindType::Luoxue,
            "maimai_cn" => BindType::MaimaiCn,
            _ => BindType::Other(s),
        }
    }
}

impl From<BindType> for String {
    fn from(t: BindType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for BindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub bind_type: BindType,
    pub bind_content: String,
    #[serde(default)]
    pub bind_name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// 当前档案：一个默认的国服账号 + 与之关联的其它绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub primary: Bind,
    pub others: Vec<Bind>,
}

impl Profile {
    /// 从 Remi 的"当前绑定"列表推导。没有默认国服账号时返回 None。
    pub fn from_binds(binds: Vec<Bind>) -> Option<Self> {
        let idx = binds
            .iter()
            .position(|b| b.bind_type == BindType::MaimaiCn && b.is_default)?;
        let mut binds = binds;
        let primary = binds.remove(idx);
        let others = binds
            .into_iter()
            .filter(|b| b.bind_type != BindType::MaimaiCn)
            .collect();
        Some(Self { primary, others })
    }

    /// 机台 UID (国服账号的 bind_content)
    pub fn arcade_uid(&self) -> Result<u64, BindError> {
        self.primary
            .bind_content
            .trim()
            .parse()
            .map_err(|_| BindError::InvalidArcadeUid(self.primary.bind_content.clone()))
    }

    pub fn bind_of(&self, kind: ProviderKind) -> Option<&Bind> {
        let target = kind.bind_type();
        self.others.iter().find(|b| b.bind_type == target)
    }
}

/// 水鱼账号密码，以 JSON 形式存放在 bind_content 中
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivingFishCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DivingFishCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DivingFishCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl DivingFishCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, BindError> {
        serde_json::from_str(content)
            .map_err(|_| BindError::MalformedCredential(ProviderKind::DivingFish))
    }
}

/// 更新当前档案关联的查分器绑定 (按绑定名)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileBindUpdate {
    pub divingfish: Option<String>,
    pub luoxue: Option<String>,
}

impl ProfileBindUpdate {
    pub fn for_provider(kind: ProviderKind, bind_name: impl Into<String>) -> Self {
        let name = Some(bind_name.into());
        match kind {
            ProviderKind::DivingFish => Self {
                divingfish: name,
                ..Default::default()
            },
            ProviderKind::Lxns => Self {
                luoxue: name,
                ..Default::default()
            },
        }
    }
}

/// 查分器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    DivingFish,
    Lxns,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::DivingFish, ProviderKind::Lxns];

    pub fn bind_type(&self) -> BindType {
        match self {
            ProviderKind::DivingFish => BindType::DivingFish,
            ProviderKind::Lxns => BindType::Luoxue,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::DivingFish => "水鱼",
            ProviderKind::Lxns => "落雪",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::DivingFish => &["水鱼", "divingfish", "df", "shuiyu"],
            ProviderKind::Lxns => &["落雪", "lxns", "luoxue", "lx"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("不支持的数据源: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.aliases().contains(&needle.as_str()))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(t: &str, content: &str, name: &str, default: bool) -> Bind {
        Bind {
            bind_type: BindType::from(t.to_string()),
            bind_content: content.into(),
            bind_name: name.into(),
            is_default: default,
        }
    }

    #[test]
    fn bind_type_keeps_unknown_strings() {
        let b: Bind = serde_json::from_str(
            r#"{"bind_type":"chunithm","bind_content":"x","bind_name":"n","is_default":false}"#,
        )
        .unwrap();
        assert_eq!(b.bind_type, BindType::Other("chunithm".into()));
        let back = serde_json::to_string(&b).unwrap();
        assert!(back.contains(r#""bind_type":"chunithm""#));

        let known: BindType = serde_json::from_str(r#""maimai_cn""#).unwrap();
        assert_eq!(known, BindType::MaimaiCn);
    }

    #[test]
    fn profile_picks_default_primary() {
        let profile = Profile::from_binds(vec![
            bind("luoxue", "123456789", "lx", true),
            bind("maimai_cn", "1001", "old", false),
            bind("maimai_cn", "1002", "main", true),
            bind("divingfish", r#"{"username":"u","password":"p"}"#, "df", true),
        ])
        .unwrap();

        assert_eq!(profile.primary.bind_name, "main");
        assert!(profile.primary.is_default);
        assert_eq!(profile.others.len(), 2);
        assert_eq!(profile.arcade_uid().unwrap(), 1002);
        assert_eq!(profile.bind_of(ProviderKind::Lxns).unwrap().bind_name, "lx");
    }

    #[test]
    fn no_default_primary_means_no_profile() {
        assert!(Profile::from_binds(vec![bind("maimai_cn", "1", "a", false)]).is_none());
        assert!(Profile::from_binds(vec![]).is_none());
    }

    #[test]
    fn credential_parsing() {
        let c = DivingFishCredential::parse(r#"{"username":"u","password":"secret"}"#).unwrap();
        assert_eq!(c, DivingFishCredential::new("u", "secret"));
        assert!(!format!("{:?}", c).contains("secret"));

        for bad in ["not json", r#"{"username":"u"}"#, "[]"] {
            assert_eq!(
                DivingFishCredential::parse(bad),
                Err(BindError::MalformedCredential(ProviderKind::DivingFish))
            );
        }
    }

    #[test]
    fn provider_aliases() {
        for s in ["水鱼", "df", "DivingFish", "shuiyu"] {
            assert_eq!(s.parse::<ProviderKind>(), Ok(ProviderKind::DivingFish));
        }
        for s in ["落雪", "lx", "LXNS", "luoxue"] {
            assert_eq!(s.parse::<ProviderKind>(), Ok(ProviderKind::Lxns));
        }
        assert!("arcade".parse::<ProviderKind>().is_err());
    }
}
