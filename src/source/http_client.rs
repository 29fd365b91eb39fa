//! xiaohongshu-mcp REST API 客户端
//!
//! - `GET  /api/v1/login/status` 检查登录状态
//! - `POST /api/v1/feeds/search` 搜索笔记
//! - `POST /api/v1/feeds/detail` 获取笔记详情

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::{SortHint, SourceConfig};
use crate::source::{ContentSource, SourceError, parse_count};
use crate::types::{NoteDetail, NotePreview};

const NOTE_URL_PREFIX: &str = "https://www.xiaohongshu.com/explore/";

/// 计数字段可能是整数、浮点或 "1.2万" 这样的字符串
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CountValue {
    Int(u64),
    Float(f64),
    Text(String),
}

impl CountValue {
    fn value(&self) -> u64 {
        match self {
            CountValue::Int(v) => *v,
            CountValue::Float(v) if v.is_finite() && *v >= 0.0 => *v as u64,
            CountValue::Float(_) => 0,
            CountValue::Text(text) => parse_count(text),
        }
    }
}

fn count(value: &Option<CountValue>) -> u64 {
    value.as_ref().map(CountValue::value).unwrap_or(0)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiEnvelope {
    success: bool,
    message: Option<String>,
    error: Option<String>,
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Feed {
    id: String,
    xsec_token: String,
    note_card: NoteCard,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NoteCard {
    display_title: String,
    desc: String,
    user: FeedUser,
    interact_info: InteractInfo,
    cover: Cover,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedUser {
    nickname: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InteractInfo {
    liked_count: Option<CountValue>,
    comment_count: Option<CountValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Cover {
    url_default: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawNote {
    title: String,
    display_title: String,
    desc: String,
    content: String,
    user: FeedUser,
    image_list: Vec<RawImage>,
    tag_list: Vec<RawTag>,
    interact_info: InteractInfo,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawImage {
    Object {
        #[serde(default, rename = "urlDefault")]
        url_default: String,
        #[serde(default)]
        url: String,
    },
    Plain(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTag {
    Object {
        #[serde(default)]
        name: String,
    },
    Plain(String),
}

/// 登录状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginStatus {
    pub is_logged_in: bool,
    pub username: String,
}

/// 小红书MCP HTTP客户端
pub struct XhsHttpClient {
    http: reqwest::Client,
    base_url: String,
    status_timeout: Duration,
}

impl XhsHttpClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            status_timeout: Duration::from_secs(config.status_timeout_seconds),
        })
    }

    /// 检查登录状态（短超时）
    pub async fn check_login_status(&self) -> Result<LoginStatus, SourceError> {
        let response = self
            .http
            .get(format!("{}/api/v1/login/status", self.base_url))
            .timeout(self.status_timeout)
            .send()
            .await?;
        let envelope: ApiEnvelope = response.json().await?;

        if !envelope.success {
            return Ok(LoginStatus::default());
        }
        Ok(LoginStatus {
            is_logged_in: envelope
                .data
                .get("is_logged_in")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            username: envelope
                .data
                .get("username")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<ApiEnvelope, SourceError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let raw: Value = response.json().await?;
        // 详情接口的部分版本不带 success 字段，这里保留原始结构
        let envelope = match serde_json::from_value::<ApiEnvelope>(raw.clone()) {
            Ok(mut envelope) => {
                if envelope.data.is_null() {
                    envelope.data = raw;
                }
                envelope
            }
            Err(_) => ApiEnvelope {
                success: true,
                data: raw,
                ..Default::default()
            },
        };
        Ok(envelope)
    }
}

/// 将搜索结果中的Feed解析为预览
fn feed_to_preview(feed: Feed) -> NotePreview {
    let card = feed.note_card;
    let author = if card.user.nickname.is_empty() {
        card.user.name
    } else {
        card.user.nickname
    };
    let cover = if card.cover.url_default.is_empty() {
        card.cover.url
    } else {
        card.cover.url_default
    };

    NotePreview {
        url: format!("{}{}", NOTE_URL_PREFIX, feed.id),
        id: feed.id,
        title: card.display_title,
        author,
        content_preview: card.desc.chars().take(200).collect(),
        likes: count(&card.interact_info.liked_count),
        comments: count(&card.interact_info.comment_count),
        access_token: Some(feed.xsec_token).filter(|token| !token.is_empty()),
        cover_image: Some(cover).filter(|url| !url.is_empty()),
    }
}

/// 详情接口的笔记可能位于 data.note、data.data.note、data 或顶层
fn locate_note(payload: &Value) -> Option<&Value> {
    let looks_like_note =
        |value: &Value| value.get("title").is_some() || value.get("desc").is_some();

    if let Some(note) = payload.get("note") {
        return Some(note);
    }
    if let Some(note) = payload.get("data").and_then(|inner| inner.get("note")) {
        return Some(note);
    }
    if looks_like_note(payload) {
        return Some(payload);
    }
    None
}

fn raw_note_to_detail(note: RawNote, id: &str) -> NoteDetail {
    let images = note
        .image_list
        .into_iter()
        .filter_map(|image| {
            let url = match image {
                RawImage::Object { url_default, url } => {
                    if url_default.is_empty() { url } else { url_default }
                }
                RawImage::Plain(url) => url,
            };
            Some(url).filter(|url| !url.is_empty())
        })
        .collect();

    let tags = note
        .tag_list
        .into_iter()
        .map(|tag| match tag {
            RawTag::Object { name } => name,
            RawTag::Plain(name) => name,
        })
        .filter(|name| !name.is_empty())
        .collect();

    NoteDetail {
        title: if note.title.is_empty() { note.display_title } else { note.title },
        content: if note.desc.is_empty() { note.content } else { note.desc },
        author: note.user.nickname,
        images,
        tags,
        likes: count(&note.interact_info.liked_count),
        comments: count(&note.interact_info.comment_count),
        url: format!("{}{}", NOTE_URL_PREFIX, id),
    }
}

#[async_trait]
impl ContentSource for XhsHttpClient {
    async fn search(&self, keyword: &str, sort: SortHint) -> Result<Vec<NotePreview>, SourceError> {
        let envelope = self
            .post(
                "/api/v1/feeds/search",
                json!({
                    "keyword": keyword,
                    "filters": { "sort_by": sort.as_filter(), "note_type": "不限" },
                }),
            )
            .await?;

        if !envelope.success {
            let message = envelope
                .message
                .or(envelope.error)
                .unwrap_or_else(|| "search failed".to_string());
            return Err(SourceError::Rejected(message));
        }

        let feeds = envelope
            .data
            .get("feeds")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let feeds: Vec<Feed> =
            serde_json::from_value(feeds).map_err(|e| SourceError::Malformed(e.to_string()))?;

        Ok(feeds.into_iter().map(feed_to_preview).collect())
    }

    async fn fetch_detail(
        &self,
        id: &str,
        access_token: Option<&str>,
    ) -> Result<NoteDetail, SourceError> {
        let token = access_token
            .filter(|token| !token.is_empty())
            .ok_or(SourceError::MissingToken)?;

        let envelope = self
            .post(
                "/api/v1/feeds/detail",
                json!({ "feed_id": id, "xsec_token": token }),
            )
            .await?;

        let Some(note) = locate_note(&envelope.data) else {
            return Ok(NoteDetail {
                url: format!("{}{}", NOTE_URL_PREFIX, id),
                ..Default::default()
            });
        };
        let raw: RawNote = serde_json::from_value(note.clone())
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(raw_note_to_detail(raw, id))
    }
}
