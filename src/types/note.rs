use serde::{Deserialize, Serialize};

/// 笔记预览（搜索结果）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotePreview {
    pub id: String,
    pub title: String,
    pub author: String,
    pub content_preview: String,
    pub likes: u64,
    pub comments: u64,
    pub url: String,
    /// 获取详情所需的访问令牌。只由搜索结果返回，且会过期，无法单独重新获取
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl NotePreview {
    /// 可用的访问令牌（空字符串视为缺失）
    pub fn usable_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.trim().is_empty())
    }
}

/// 笔记详情
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteDetail {
    pub title: String,
    pub content: String,
    pub author: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub likes: u64,
    pub comments: u64,
    pub url: String,
}

impl NoteDetail {
    /// 详情获取失败时，用预览数据构造的降级详情
    pub fn degraded_from(preview: &NotePreview) -> Self {
        Self {
            title: preview.title.clone(),
            content: preview.content_preview.clone(),
            author: preview.author.clone(),
            images: preview.cover_image.iter().cloned().collect(),
            tags: Vec::new(),
            likes: preview.likes,
            comments: preview.comments,
            url: preview.url.clone(),
        }
    }

    /// 是否包含有效正文或图片
    pub fn has_payload(&self) -> bool {
        !self.content.trim().is_empty() || !self.images.is_empty()
    }
}

/// 笔记完整数据（预览+详情），创建后不再修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub preview: NotePreview,
    pub detail: NoteDetail,
    /// 详情是否为预览的降级副本
    #[serde(default)]
    pub degraded: bool,
}

impl NoteRecord {
    pub fn new(preview: NotePreview, detail: NoteDetail) -> Self {
        Self {
            preview,
            detail,
            degraded: false,
        }
    }

    pub fn degraded(preview: NotePreview) -> Self {
        let detail = NoteDetail::degraded_from(&preview);
        Self {
            preview,
            detail,
            degraded: true,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.detail.title.is_empty() {
            &self.preview.title
        } else {
            &self.detail.title
        }
    }
}
