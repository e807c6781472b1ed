use super::bind::ProviderKind;
use reqwest::StatusCode;

/// 远端服务调用失败的分类
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// 404：远端明确表示不存在
    #[error("远端资源不存在")]
    NotFound,
    /// 409：并发创建冲突
    #[error("远端资源冲突")]
    Conflict,
    /// 其余状态码、网络错误、解码失败
    #[error("远端服务暂时不可用: {0}")]
    Transient(String),
}

impl RemoteError {
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound,
            StatusCode::CONFLICT => RemoteError::Conflict,
            other => RemoteError::Transient(format!("{} 返回 {}", context, other)),
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        RemoteError::Transient(msg.into())
    }
}

/// 非 2xx 状态码按 `from_status` 分类
pub(crate) fn ensure_success(
    resp: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(RemoteError::from_status(status, context))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RemoteError::from_status(status, "请求"),
            None => RemoteError::Transient(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// 没有当前档案 (未绑定国服账号或没有默认账号)
    #[error("没有当前 maimai 档案")]
    NoProfile,
    #[error("找不到名为 {0} 的档案")]
    ProfileNotFound(String),
    #[error("当前档案未绑定{0}查分器")]
    NotBound(ProviderKind),
    #[error("{0}绑定数据格式错误或不完整")]
    MalformedCredential(ProviderKind),
    #[error("无效的机台 UID: {0}")]
    InvalidArcadeUid(String),
    /// 当前档案没有关联任何查分器
    #[error("当前档案未绑定任何查分器")]
    NoProviderBound,
    #[error("{0}查分器未配置")]
    ProviderUnavailable(ProviderKind),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
