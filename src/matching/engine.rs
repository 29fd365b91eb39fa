use std::collections::HashSet;
use std::sync::Arc;

use crate::config::MatchConfig;
use crate::llm::ImageGenerator;
use crate::matching::keywords::{normalize, scene_overlap, tokenize};
use crate::progress::{ProgressSink, Stage};
use crate::types::{ClassificationMap, ImageClassification, OutlineSection};

/// 章节的目标关键词
#[derive(Debug, Clone, PartialEq)]
pub struct TargetKeywords {
    pub keywords: Vec<String>,
    /// 是否由大纲显式给出
    pub explicit: bool,
}

impl TargetKeywords {
    pub fn for_section(section: &OutlineSection) -> Self {
        let required = normalize(&section.required_image_keywords);
        if !required.is_empty() {
            return Self {
                keywords: required,
                explicit: true,
            };
        }
        Self {
            keywords: tokenize(&format!("{} {}", section.title, section.content)),
            explicit: false,
        }
    }
}

/// 候选图片及其得分
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub record: &'a ImageClassification,
    pub score: i32,
    /// 除质量分之外的匹配得分，用于判断是否需要生成图片
    pub relevance: i32,
}

/// 图片与章节的匹配引擎
///
/// 已分配的图片不会被后续章节再次使用；生成的图片不参与该去重。
pub struct MatchingEngine {
    config: MatchConfig,
    generator: Option<Arc<dyn ImageGenerator>>,
    image_size: String,
    progress: ProgressSink,
}

impl MatchingEngine {
    pub fn new(
        config: MatchConfig,
        generator: Option<Arc<dyn ImageGenerator>>,
        image_size: impl Into<String>,
        progress: ProgressSink,
    ) -> Self {
        Self {
            config,
            generator,
            image_size: image_size.into(),
            progress,
        }
    }

    /// 按大纲顺序为每个内容章节分配图片
    pub async fn assign(
        &self,
        outline: Vec<OutlineSection>,
        classifications: &ClassificationMap,
        topic: &str,
    ) -> Vec<OutlineSection> {
        let mut used: HashSet<String> = HashSet::new();
        let mut enriched = Vec::with_capacity(outline.len());

        for mut section in outline {
            if !section.section_type.takes_images() {
                section.assigned_images = Vec::new();
                enriched.push(section);
                continue;
            }

            let targets = TargetKeywords::for_section(&section);
            let candidates = self.rank(&section, &targets, classifications, &used);
            let quota = self.quota(&section);

            let selected: Vec<&Candidate> = candidates.iter().take(quota).collect();
            let mut assigned: Vec<String> = selected
                .iter()
                .map(|candidate| candidate.record.image_url.clone())
                .collect();
            used.extend(assigned.iter().cloned());

            let best_relevance = selected.first().map(|candidate| candidate.relevance);
            let needed = self.shortfall(assigned.len(), best_relevance);
            if needed > 0 {
                assigned.extend(self.generate(&section, &targets, topic, needed).await);
            }

            self.progress.info(
                Stage::Matching,
                format!(
                    "🖼️ '{}' | 候选: {} | 分配: {}",
                    section.title,
                    candidates.len(),
                    assigned.len()
                ),
            );
            section.assigned_images = assigned;
            enriched.push(section);
        }

        enriched
    }

    /// 对未使用且可用的图片打分，按分数降序（同分保持分类结果的插入顺序）
    pub fn rank<'a>(
        &self,
        section: &OutlineSection,
        targets: &TargetKeywords,
        classifications: &'a ClassificationMap,
        used: &HashSet<String>,
    ) -> Vec<Candidate<'a>> {
        let mut candidates: Vec<Candidate<'a>> = classifications
            .iter()
            .filter(|record| record.should_use && !used.contains(&record.image_url))
            .map(|record| {
                let relevance = self.relevance(section, targets, record);
                Candidate {
                    record,
                    score: i32::from(record.quality_score) + relevance,
                    relevance,
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates
    }

    fn relevance(
        &self,
        section: &OutlineSection,
        targets: &TargetKeywords,
        record: &ImageClassification,
    ) -> i32 {
        let weight = if targets.explicit {
            self.config.explicit_keyword_weight
        } else {
            self.config.derived_keyword_weight
        };
        let content_keywords: HashSet<String> =
            normalize(&record.content_keywords).into_iter().collect();
        let overlap = targets
            .keywords
            .iter()
            .filter(|keyword| content_keywords.contains(*keyword))
            .count() as i32;

        weight * overlap
            + Self::scene_bonus(section, record)
            + Self::title_bonus(section, record)
            + Self::category_bonus(section, record)
    }

    fn scene_bonus(section: &OutlineSection, record: &ImageClassification) -> i32 {
        let scene = record.scene_type.trim();
        if scene.is_empty() {
            return 0;
        }
        if section
            .preferred_scene_types
            .iter()
            .any(|preferred| preferred.trim() == scene)
        {
            return 5;
        }
        match scene_overlap(scene, &section.title) {
            0 => 0,
            1 => 4,
            _ => 8,
        }
    }

    fn title_bonus(section: &OutlineSection, record: &ImageClassification) -> i32 {
        let title = section.title.trim();
        if title.is_empty() {
            return 0;
        }
        let hints = record
            .matched_sections
            .iter()
            .map(|hint| hint.trim())
            .filter(|hint| !hint.is_empty());

        let mut partial = false;
        for hint in hints {
            if hint == title {
                return 5;
            }
            partial |= hint.contains(title) || title.contains(hint);
        }
        if partial { 3 } else { 0 }
    }

    fn category_bonus(section: &OutlineSection, record: &ImageClassification) -> i32 {
        if section
            .preferred_image_types
            .iter()
            .any(|label| record.category.matches_label(label))
        {
            2
        } else {
            0
        }
    }

    /// 本章节最多选取的已有图片数量
    fn quota(&self, section: &OutlineSection) -> usize {
        (section.suggested_image_count + 1)
            .min(self.config.max_images_per_section)
            .max(self.config.min_images_per_section)
    }

    /// 需要生成的图片数量；没有生成能力时为零
    fn shortfall(&self, selected: usize, best_relevance: Option<i32>) -> usize {
        if self.generator.is_none() {
            return 0;
        }
        let floor = self.config.min_images_per_section;
        let needed = if selected < floor {
            floor - selected
        } else if best_relevance.is_some_and(|relevance| relevance < self.config.score_threshold) {
            1
        } else {
            0
        };
        needed.min(self.config.max_images_per_section.saturating_sub(selected))
    }

    async fn generate(
        &self,
        section: &OutlineSection,
        targets: &TargetKeywords,
        topic: &str,
        count: usize,
    ) -> Vec<String> {
        let Some(generator) = &self.generator else {
            return Vec::new();
        };

        let excerpt: String = section
            .content
            .chars()
            .take(self.config.excerpt_chars)
            .collect();
        let scene_hints = if section.preferred_scene_types.is_empty() {
            "不限".to_string()
        } else {
            section.preferred_scene_types.join("、")
        };
        let prompt = format!(
            include_str!("prompts/generate_image.tpl"),
            topic,
            section.title,
            targets.keywords.join("、"),
            scene_hints,
            excerpt
        );

        self.progress.info(
            Stage::Matching,
            format!("🎨 章节'{}'缺少合适图片，生成 {} 张", section.title, count),
        );

        let mut generated = Vec::with_capacity(count);
        for index in 0..count {
            match generator.generate(&prompt, &self.image_size).await {
                Ok(url) => {
                    tracing::info!(section = %section.title, "生成图片 {}/{} 成功", index + 1, count);
                    generated.push(url);
                }
                Err(e) => {
                    self.progress.warn(
                        Stage::Matching,
                        format!("⚠️ 章节'{}'生成图片失败: {}", section.title, e),
                    );
                }
            }
        }
        generated
    }
}

#[cfg(test)]
mod tests;
