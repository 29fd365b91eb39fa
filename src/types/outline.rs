use serde::{Deserialize, Serialize};

/// 章节类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Cover,
    #[default]
    Content,
    Summary,
}

impl SectionType {
    /// 封面和总结不参与配图
    pub fn takes_images(&self) -> bool {
        matches!(self, SectionType::Content)
    }
}

/// 报告大纲中的一个章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSection {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub title: String,
    pub content: String,
    pub source_note_indices: Vec<usize>,
    /// 配图应包含的关键词，由大纲显式给出
    pub required_image_keywords: Vec<String>,
    /// 偏好的图片场景类型
    pub preferred_scene_types: Vec<String>,
    pub suggested_image_count: usize,
    /// 旧版大纲使用的偏好分类列表（实景/攻略/装饰/广告）
    pub preferred_image_types: Vec<String>,
    pub assigned_images: Vec<String>,
}

impl Default for OutlineSection {
    fn default() -> Self {
        Self {
            section_type: SectionType::Content,
            title: String::new(),
            content: String::new(),
            source_note_indices: Vec::new(),
            required_image_keywords: Vec::new(),
            preferred_scene_types: Vec::new(),
            suggested_image_count: 2,
            preferred_image_types: Vec::new(),
            assigned_images: Vec::new(),
        }
    }
}

impl OutlineSection {
    pub fn content(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}
