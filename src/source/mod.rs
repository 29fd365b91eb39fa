//! 内容源客户端 - 关键词搜索与笔记详情

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SortHint;
use crate::types::{NoteDetail, NotePreview};

pub mod http_client;

pub use http_client::XhsHttpClient;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("source rejected request: {0}")]
    Rejected(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("access token missing")]
    MissingToken,
}

impl SourceError {
    /// 内容源不可达（连接失败或超时），区别于服务端返回的业务错误
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SourceError::Timeout(_) | SourceError::Transport(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// 内容源
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// 关键词搜索，可能暂时返回空结果
    async fn search(&self, keyword: &str, sort: SortHint) -> Result<Vec<NotePreview>, SourceError>;

    /// 获取笔记详情；访问令牌只能来自搜索结果
    async fn fetch_detail(
        &self,
        id: &str,
        access_token: Option<&str>,
    ) -> Result<NoteDetail, SourceError>;
}

/// 解析计数值，支持 "1.2万"、"3亿" 之类的写法
pub fn parse_count(raw: &str) -> u64 {
    let value = raw.trim().replace(',', "");
    if value.is_empty() {
        return 0;
    }

    let (number, multiplier) = if let Some(stripped) = value.strip_suffix('万') {
        (stripped, 10_000.0)
    } else if let Some(stripped) = value.strip_suffix('亿') {
        (stripped, 100_000_000.0)
    } else if let Some(stripped) = value.strip_suffix(['w', 'W']) {
        (stripped, 10_000.0)
    } else {
        (value.as_str(), 1.0)
    };

    match number.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => (parsed * multiplier).round() as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_plain_and_units() {
        assert_eq!(parse_count("123"), 123);
        assert_eq!(parse_count("1.2万"), 12_000);
        assert_eq!(parse_count("3亿"), 300_000_000);
        assert_eq!(parse_count("2w"), 20_000);
        assert_eq!(parse_count("1,024"), 1024);
    }

    #[test]
    fn test_parse_count_garbage_is_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("  "), 0);
        assert_eq!(parse_count("很多"), 0);
        assert_eq!(parse_count("-5"), 0);
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(SourceError::Transport("refused".into()).is_unreachable());
        assert!(SourceError::Timeout("slow".into()).is_unreachable());
        assert!(!SourceError::Rejected("not logged in".into()).is_unreachable());
        assert!(!SourceError::MissingToken.is_unreachable());
    }
}
