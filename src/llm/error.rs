use thiserror::Error;

/// 模型调用错误
///
/// 限流需要与其他失败区分开，重试策略依赖这一点。
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl ModelError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ModelError::RateLimited(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ModelError::Timeout(_))
    }

    /// 根据HTTP状态码构造错误，429视为限流
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            ModelError::RateLimited(body)
        } else {
            ModelError::Http { status, body }
        }
    }

    /// 只有错误文本可用时（例如第三方SDK），按文本识别限流
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("429") || lowered.contains("rate limit") || lowered.contains("too many requests") {
            ModelError::RateLimited(message)
        } else if lowered.contains("timed out") || lowered.contains("timeout") {
            ModelError::Timeout(message)
        } else {
            ModelError::Transport(message)
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ModelError::Timeout(err.to_string());
        }
        match err.status() {
            Some(status) => ModelError::from_status(status.as_u16(), err.to_string()),
            None if err.is_decode() => ModelError::Malformed(err.to_string()),
            None => ModelError::Transport(err.to_string()),
        }
    }
}
