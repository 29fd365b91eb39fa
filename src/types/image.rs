use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 图片分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageCategory {
    /// 实景：真实场景拍摄
    Real,
    /// 攻略：包含文字说明的教程图
    Howto,
    /// 装饰：通用装饰插图
    Decorative,
    /// 广告：明显的营销推广图
    Ad,
    /// 模型未给出或无法识别的分类
    #[default]
    Unclassified,
}

impl ImageCategory {
    /// 从模型输出的标签解析，同时接受中文与英文写法
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "real" | "实景" | "photo" | "scene" => ImageCategory::Real,
            "howto" | "how-to" | "guide" | "tutorial" | "攻略" | "教程" => ImageCategory::Howto,
            "decorative" | "decoration" | "装饰" => ImageCategory::Decorative,
            "ad" | "ads" | "advertisement" | "广告" => ImageCategory::Ad,
            _ => ImageCategory::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Real => "real",
            ImageCategory::Howto => "howto",
            ImageCategory::Decorative => "decorative",
            ImageCategory::Ad => "ad",
            ImageCategory::Unclassified => "unclassified",
        }
    }

    /// 判断大纲里给出的类型标签是否指向本分类
    pub fn matches_label(&self, label: &str) -> bool {
        let parsed = ImageCategory::from_label(label);
        parsed != ImageCategory::Unclassified && parsed == *self
    }
}

impl std::fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for ImageCategory {
    fn from(value: String) -> Self {
        ImageCategory::from_label(&value)
    }
}

impl From<ImageCategory> for String {
    fn from(value: ImageCategory) -> Self {
        value.as_str().to_string()
    }
}

/// 单张图片的分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageClassification {
    pub image_url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: ImageCategory,
    /// 图片核心内容关键词，用于与章节做语义匹配
    pub content_keywords: Vec<String>,
    /// 场景类型，如“数据展示”“教程步骤”
    pub scene_type: String,
    /// 质量分数，取值 1..=10
    pub quality_score: u8,
    pub should_use: bool,
    /// 模型认为适合的章节标题
    pub matched_sections: Vec<String>,
}

impl Default for ImageClassification {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            description: String::new(),
            tags: Vec::new(),
            category: ImageCategory::Unclassified,
            content_keywords: Vec::new(),
            scene_type: String::new(),
            quality_score: Self::DEFAULT_QUALITY,
            should_use: true,
            matched_sections: Vec::new(),
        }
    }
}

impl ImageClassification {
    pub const DEFAULT_QUALITY: u8 = 5;

    /// 模型失败或解析失败时的默认记录：默认可用，交给后续流程决定
    pub fn fallback(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            ..Default::default()
        }
    }

    /// 将任意分数收敛到 1..=10
    pub fn clamp_quality(score: i64) -> u8 {
        score.clamp(1, 10) as u8
    }
}

/// 以图片URL为键、保持插入顺序的分类结果集合
///
/// 插入顺序决定了匹配阶段同分候选的先后，因此不使用 `HashMap` 的迭代顺序。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ImageClassification>", into = "Vec<ImageClassification>")]
pub struct ClassificationMap {
    entries: Vec<ImageClassification>,
    index: HashMap<String, usize>,
}

impl ClassificationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入记录；URL已存在时覆盖旧记录并保留原位置，返回被覆盖的记录
    pub fn insert(&mut self, record: ImageClassification) -> Option<ImageClassification> {
        match self.index.get(&record.image_url) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position], record)),
            None => {
                self.index
                    .insert(record.image_url.clone(), self.entries.len());
                self.entries.push(record);
                None
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<&ImageClassification> {
        self.index.get(url).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageClassification> {
        self.entries.iter()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|record| record.image_url.as_str())
    }

    /// 按分类统计数量
    pub fn category_counts(&self) -> Vec<(ImageCategory, usize)> {
        let mut counts: Vec<(ImageCategory, usize)> = Vec::new();
        for record in &self.entries {
            match counts.iter_mut().find(|(category, _)| *category == record.category) {
                Some((_, count)) => *count += 1,
                None => counts.push((record.category, 1)),
            }
        }
        counts
    }

    pub fn usable_count(&self) -> usize {
        self.entries.iter().filter(|record| record.should_use).count()
    }
}

impl From<Vec<ImageClassification>> for ClassificationMap {
    fn from(records: Vec<ImageClassification>) -> Self {
        let mut map = ClassificationMap::new();
        for record in records {
            map.insert(record);
        }
        map
    }
}

impl From<ClassificationMap> for Vec<ImageClassification> {
    fn from(map: ClassificationMap) -> Self {
        map.entries
    }
}

impl FromIterator<ImageClassification> for ClassificationMap {
    fn from_iter<I: IntoIterator<Item = ImageClassification>>(iter: I) -> Self {
        let mut map = ClassificationMap::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}
